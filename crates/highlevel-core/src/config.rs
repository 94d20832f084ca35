use std::env;
use std::path::Path;

use thiserror::Error;
use url::Url;

use crate::auth::{OAuthEndpoints, DEFAULT_SCOPES};

pub const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com";
pub const DEFAULT_AUTHORIZATION_URL: &str =
    "https://marketplace.leadconnectorhq.com/oauth/chooselocation";
pub const DEFAULT_API_VERSION: &str = "2021-07-28";

pub const ENV_CLIENT_ID: &str = "HIGHLEVEL_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "HIGHLEVEL_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "HIGHLEVEL_REDIRECT_URI";
pub const ENV_CUSTOM_FIELD_NAME: &str = "HIGHLEVEL_CUSTOM_FIELD_NAME";
pub const ENV_BASE_URL: &str = "HIGHLEVEL_BASE_URL";
pub const ENV_AUTHORIZATION_URL: &str = "HIGHLEVEL_AUTH_URL";
pub const ENV_API_VERSION: &str = "HIGHLEVEL_API_VERSION";
pub const ENV_SCOPES: &str = "HIGHLEVEL_SCOPES";

/// OAuth application credentials registered with the marketplace.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
}

/// Process-wide settings, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub custom_field_name: String,
    pub base_url: Url,
    pub authorization_url: Url,
    pub api_version: String,
    pub scopes: Vec<String>,
}

impl Settings {
    /// Load settings from the process environment, seeding it from `.env` when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if Path::new(".env").exists() {
            dotenv::dotenv().map_err(|err| ConfigError::Dotenv(err.to_string()))?;
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::MissingVar(key));
        let parse_url = |key: &'static str, raw: &str| {
            Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var: key, source })
        };

        let credentials = Credentials {
            client_id: require(ENV_CLIENT_ID)?,
            client_secret: require(ENV_CLIENT_SECRET)?,
            redirect_uri: parse_url(ENV_REDIRECT_URI, &require(ENV_REDIRECT_URI)?)?,
        };
        let custom_field_name = require(ENV_CUSTOM_FIELD_NAME)?;

        let base_url = parse_url(
            ENV_BASE_URL,
            &get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
        )?;
        let authorization_url = parse_url(
            ENV_AUTHORIZATION_URL,
            &get(ENV_AUTHORIZATION_URL).unwrap_or_else(|| DEFAULT_AUTHORIZATION_URL.to_owned()),
        )?;
        let api_version = get(ENV_API_VERSION).unwrap_or_else(|| DEFAULT_API_VERSION.to_owned());

        let scopes = get(ENV_SCOPES)
            .map(|raw| raw.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            credentials,
            custom_field_name,
            base_url,
            authorization_url,
            api_version,
            scopes,
        })
    }

    /// Consent and token endpoints derived from the configured URLs.
    pub fn oauth_endpoints(&self) -> Result<OAuthEndpoints, ConfigError> {
        let token_url = join_path(&self.base_url, "/oauth/token").map_err(|source| {
            ConfigError::InvalidUrl {
                var: ENV_BASE_URL,
                source,
            }
        })?;
        Ok(OAuthEndpoints {
            authorization_url: self.authorization_url.clone(),
            token_url,
        })
    }
}

/// Append `path` to `base` without dropping any path prefix already on the base.
pub(crate) fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let trimmed = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{trimmed}{path}"))
}

/// Errors raised while assembling [`Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid URL in {var}: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to load .env file: {0}")]
    Dotenv(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_CLIENT_ID, "client"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_REDIRECT_URI, "http://localhost:8000/callback"),
            (ENV_CUSTOM_FIELD_NAME, "Status"),
        ]
    }

    #[test]
    fn defaults_applied_when_optional_vars_absent() {
        let settings = Settings::from_lookup(lookup_from(&required())).unwrap();
        assert_eq!(settings.credentials.client_id, "client");
        assert_eq!(settings.custom_field_name, "Status");
        assert_eq!(settings.base_url.as_str(), "https://services.leadconnectorhq.com/");
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert_eq!(settings.scopes.len(), DEFAULT_SCOPES.len());
    }

    #[test]
    fn missing_secret_is_reported() {
        let pairs: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| *k != ENV_CLIENT_SECRET)
            .collect();
        let err = Settings::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_CLIENT_SECRET)));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| *k != ENV_CUSTOM_FIELD_NAME)
            .collect();
        pairs.push((ENV_CUSTOM_FIELD_NAME, "   "));
        let err = Settings::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_CUSTOM_FIELD_NAME)));
    }

    #[test]
    fn invalid_redirect_uri_rejected() {
        let mut pairs: Vec<_> = required()
            .into_iter()
            .filter(|(k, _)| *k != ENV_REDIRECT_URI)
            .collect();
        pairs.push((ENV_REDIRECT_URI, "not a url"));
        let err = Settings::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                var: ENV_REDIRECT_URI,
                ..
            }
        ));
    }

    #[test]
    fn overrides_and_token_endpoint() {
        let mut pairs = required();
        pairs.push((ENV_BASE_URL, "http://127.0.0.1:9000/api/"));
        pairs.push((ENV_SCOPES, "contacts.readonly  contacts.write"));
        pairs.push((ENV_API_VERSION, "2021-04-15"));
        let settings = Settings::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(settings.scopes, vec!["contacts.readonly", "contacts.write"]);
        assert_eq!(settings.api_version, "2021-04-15");
        let endpoints = settings.oauth_endpoints().unwrap();
        assert_eq!(
            endpoints.token_url.as_str(),
            "http://127.0.0.1:9000/api/oauth/token"
        );
    }
}
