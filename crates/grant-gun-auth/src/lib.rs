//! Credentials for the two services grant-gun talks to.

mod airtable;
mod callback;
mod hcb;

pub use airtable::AirtablePat;
pub use callback::{CallbackListener, CallbackParams, PendingCallback};
pub use hcb::{DEFAULT_REDIRECT_URI, DEFAULT_TIMEOUT, HcbOAuth, validate_token};

use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// A bearer token for one of the services.
#[derive(Clone, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl Token {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Token {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_owned()),
            refresh_token: None,
            expires_in: None,
            scope: None,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

// Initialize tracing if not already initialized
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grant_gun_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
