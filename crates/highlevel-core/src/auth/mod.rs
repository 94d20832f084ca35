mod error;
mod manual;
mod oauth;
mod session;

pub use error::AuthError;
pub use manual::run_manual_flow;
pub use oauth::{OAuthClient, OAuthEndpoints, DEFAULT_SCOPES};
pub use session::AuthSession;
