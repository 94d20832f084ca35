use std::fmt;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::auth::AuthSession;
use crate::config::{Settings, DEFAULT_API_VERSION};

const USER_AGENT: &str = "highlevel-rs/0.1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONTACT_MODEL: &str = "contact";

/// Errors returned by the REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid API endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("access token expired; authorize again")]
    TokenExpired,
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Location-scoped client for the HighLevel contacts and custom-field endpoints.
///
/// Holds the access token for the lifetime of the value. Requests made after the
/// token's expiry fail with [`ApiError::TokenExpired`].
#[derive(Clone)]
pub struct HighLevelClient {
    http: Client,
    base_url: Url,
    session: AuthSession,
    auth_header: String,
    api_version: String,
}

impl HighLevelClient {
    pub fn from_settings(session: &AuthSession, settings: &Settings) -> ApiResult<Self> {
        Ok(Self::new(session, settings.base_url.clone())?.with_api_version(&settings.api_version))
    }

    /// Build a client against an explicit base URL (useful for testing).
    pub fn new(session: &AuthSession, base_url: Url) -> ApiResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidEndpoint(base_url.to_string()));
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            session: session.clone(),
            auth_header: format!("Bearer {}", session.access_token),
            api_version: DEFAULT_API_VERSION.to_owned(),
        })
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn location_id(&self) -> &str {
        &self.session.location_id
    }

    /// Fetch the contacts of the current location.
    pub async fn list_contacts(&self) -> ApiResult<Vec<Contact>> {
        #[derive(Deserialize)]
        struct ContactsEnvelope {
            #[serde(default)]
            contacts: Vec<Contact>,
        }

        let url = self.endpoint(&["contacts", ""])?;
        let envelope: ContactsEnvelope = self
            .get(url, &[("locationId", self.location_id())])
            .await?;
        tracing::info!(count = envelope.contacts.len(), "retrieved contacts");
        Ok(envelope.contacts)
    }

    /// Pick one contact uniformly at random, or `None` when the location has none.
    pub async fn pick_random_contact(&self) -> ApiResult<Option<Contact>> {
        let contacts = self.list_contacts().await?;
        let picked = choose_contact(contacts, &mut rand::thread_rng());
        match &picked {
            Some(contact) => tracing::info!(contact_id = %contact.id, "selected contact"),
            None => tracing::warn!("no contacts found"),
        }
        Ok(picked)
    }

    /// Fetch the location's custom field definitions for the contact model.
    pub async fn list_custom_fields(&self) -> ApiResult<Vec<CustomField>> {
        #[derive(Deserialize)]
        struct CustomFieldsEnvelope {
            #[serde(default, rename = "customFields")]
            custom_fields: Vec<CustomField>,
        }

        let url = self.endpoint(&["locations", self.location_id(), "customFields"])?;
        let envelope: CustomFieldsEnvelope = self.get(url, &[("model", CONTACT_MODEL)]).await?;
        tracing::info!(count = envelope.custom_fields.len(), "retrieved custom fields");
        Ok(envelope.custom_fields)
    }

    /// Resolve a custom field id by exact, case-sensitive name. First match wins.
    pub async fn find_custom_field_id_by_name(&self, name: &str) -> ApiResult<Option<String>> {
        let fields = self.list_custom_fields().await?;
        let found = first_field_id_named(&fields, name);
        match &found {
            Some(id) => tracing::info!(field_id = %id, name, "found custom field"),
            None => tracing::warn!(name, "custom field not found"),
        }
        Ok(found)
    }

    /// Write a single custom field value on a contact.
    ///
    /// Returns `Ok(true)` only for a 200 response; every other status is `Ok(false)`.
    /// Transport failures are returned as errors.
    pub async fn update_contact_custom_field(
        &self,
        contact_id: &str,
        field_id: &str,
        value: &str,
    ) -> ApiResult<bool> {
        #[derive(Serialize)]
        struct UpdateContactRequest<'a> {
            #[serde(rename = "customFields")]
            custom_fields: [CustomFieldValue<'a>; 1],
        }

        let url = self.endpoint(&["contacts", contact_id])?;
        let body = UpdateContactRequest {
            custom_fields: [CustomFieldValue {
                id: field_id,
                field_value: value,
            }],
        };

        let response = self.request(Method::PUT, url)?.json(&body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if status == StatusCode::OK {
            tracing::info!(contact_id, field_id, "contact custom field updated");
            Ok(true)
        } else {
            tracing::warn!(contact_id, field_id, %status, body = %text, "contact update rejected");
            Ok(false)
        }
    }

    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> ApiResult<RequestBuilder> {
        if self.session.is_expired() {
            return Err(ApiError::TokenExpired);
        }
        tracing::debug!(method = %method.as_str(), url = %url.as_str(), "sending request");
        Ok(self
            .http
            .request(method, url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .header("Version", &self.api_version))
    }

    async fn get<R>(&self, url: Url, query: &[(&str, &str)]) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self.request(Method::GET, url)?.query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus { status, body });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Debug for HighLevelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HighLevelClient")
            .field("base_url", &self.base_url.as_str())
            .field("session", &self.session)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

fn choose_contact<R: Rng + ?Sized>(contacts: Vec<Contact>, rng: &mut R) -> Option<Contact> {
    contacts.choose(rng).cloned()
}

fn first_field_id_named(fields: &[CustomField], name: &str) -> Option<String> {
    fields
        .iter()
        .find(|field| field.name == name)
        .map(|field| field.id.clone())
}

/// A CRM contact. Only `id` is interpreted; everything else is kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A custom field definition attached to the contact model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub field_key: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// One entry of the `customFields` array sent when updating a contact.
#[derive(Debug, Clone, Serialize)]
pub struct CustomFieldValue<'a> {
    pub id: &'a str,
    pub field_value: &'a str,
}
