use std::fmt;

use chrono::{DateTime, Utc};

/// Location-scoped bearer token obtained from the authorization-code grant.
///
/// Lives for a single run; nothing is written to disk and expired sessions are
/// never refreshed.
#[derive(Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub location_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Vec<String>,
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub user_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            location_id: location_id.into(),
            expires_at: None,
            scope: vec![],
            company_id: None,
            user_id: None,
            user_type: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(ts) => Utc::now() >= ts,
            None => false,
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("location_id", &self.location_id)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("company_id", &self.company_id)
            .field("user_type", &self.user_type)
            .finish()
    }
}
