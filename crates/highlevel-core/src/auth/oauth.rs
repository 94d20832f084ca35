use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{AuthError, AuthSession};
use crate::config::{Credentials, Settings};

pub const DEFAULT_SCOPES: &[&str; 4] = &[
    "contacts.readonly",
    "contacts.write",
    "locations/customFields.readonly",
    "locations/customFields.write",
];

const DEFAULT_USER_AGENT: &str = "highlevel-rs/0.1.0";
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// OAuth endpoints used by the manual flow.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorization_url: Url,
    pub token_url: Url,
}

/// Builds consent URLs and exchanges authorization codes with the marketplace.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http: Client,
    credentials: Credentials,
    scopes: Vec<String>,
    endpoints: OAuthEndpoints,
}

impl OAuthClient {
    pub fn from_settings(settings: &Settings) -> Result<Self, AuthError> {
        let endpoints = settings.oauth_endpoints()?;
        Ok(Self::with_endpoints(settings.credentials.clone(), endpoints)?
            .with_scopes(settings.scopes.iter().cloned()))
    }

    pub fn with_endpoints(
        credentials: Credentials,
        endpoints: OAuthEndpoints,
    ) -> Result<Self, AuthError> {
        let http = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            credentials,
            scopes: vec![],
            endpoints,
        })
    }

    /// Replace the requested scopes. Duplicates are dropped, first occurrence wins.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for scope in scopes.into_iter().map(Into::into) {
            if !scope.is_empty() && !unique.contains(&scope) {
                unique.push(scope);
            }
        }
        self.scopes = unique;
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Consent URL the user opens to pick a location and approve access.
    pub fn authorization_url(&self) -> Url {
        let mut url = self.endpoints.authorization_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("response_type", "code");
            pairs.append_pair("client_id", &self.credentials.client_id);
            pairs.append_pair("redirect_uri", self.credentials.redirect_uri.as_str());
            if !self.scopes.is_empty() {
                pairs.append_pair("scope", &self.scopes.join(" "));
            }
        }
        url
    }

    /// Exchange an authorization code for a location access token.
    pub async fn exchange_code(&self, code: &str) -> Result<AuthSession, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("redirect_uri", self.credentials.redirect_uri.as_str()),
        ];

        tracing::debug!(url = %self.endpoints.token_url, "exchanging authorization code");
        let response = self
            .http
            .post(self.endpoints.token_url.clone())
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        self.handle_token_response(response).await
    }

    async fn handle_token_response(
        &self,
        response: reqwest::Response,
    ) -> Result<AuthSession, AuthError> {
        let status = response.status();
        let received_at = Utc::now();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "".into());
            return Err(AuthError::TokenEndpoint { status, body });
        }

        let body = response.text().await?;
        let payload: TokenResponse = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(source) => {
                return Err(AuthError::Decode {
                    status,
                    body,
                    source,
                })
            }
        };
        payload.into_session(received_at, status, &body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(rename = "access_token")]
    access_token: Option<String>,
    #[serde(rename = "token_type")]
    token_type: Option<String>,
    #[serde(rename = "expires_in")]
    expires_in: Option<i64>,
    scope: Option<String>,
    location_id: Option<String>,
    company_id: Option<String>,
    user_id: Option<String>,
    user_type: Option<String>,
}

impl TokenResponse {
    fn into_session(
        self,
        received_at: DateTime<Utc>,
        status: StatusCode,
        body: &str,
    ) -> Result<AuthSession, AuthError> {
        let missing = |field| AuthError::MissingField {
            field,
            status,
            body: body.to_owned(),
        };

        if let Some(token_type) = &self.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(AuthError::InvalidTokenType(token_type.clone()));
            }
        }

        let access_token = self
            .access_token
            .filter(|value| !value.is_empty())
            .ok_or_else(|| missing("access_token"))?;
        let location_id = self
            .location_id
            .filter(|value| !value.is_empty())
            .ok_or_else(|| missing("locationId"))?;

        // Lifetimes past chrono's range are treated as non-expiring.
        let expires_at = self.expires_in.and_then(|seconds| {
            Duration::try_seconds(seconds).and_then(|ttl| received_at.checked_add_signed(ttl))
        });

        let scope = self
            .scope
            .unwrap_or_default()
            .split_whitespace()
            .map(ToOwned::to_owned)
            .collect();

        Ok(AuthSession {
            access_token,
            location_id,
            expires_at,
            scope,
            company_id: self.company_id,
            user_id: self.user_id,
            user_type: self.user_type,
            created_at: received_at,
        })
    }
}
