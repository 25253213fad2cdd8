//! Error types.
//!
//! Three families, one per failure domain:
//!
//! * [`SettingsError`] — configuration could not be loaded.  Fatal at startup.
//! * [`AuthError`] — Reddit refused the credentials or the token endpoint
//!   misbehaved.  Fatal when connecting.
//! * [`FetchError`] — anything that goes wrong while listing posts.  Only
//!   [`FetchError::RateLimited`] is retried; everything else is logged and
//!   the fetch yields no posts.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("setting `{name}` must be at least {min} characters long (got {actual})")]
    TooShort {
        name: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("setting `{name}` is not a valid number of seconds: {value:?}")]
    InvalidSeconds { name: &'static str, value: String },

    #[error("failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed token response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The API throttled us.  `retry_after` is the server's hint, if any.
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("invalid subreddit name {0:?}")]
    InvalidResource(String),

    #[error("subreddit r/{0} not found")]
    NotFound(String),

    #[error("access to r/{0} is forbidden")]
    Forbidden(String),

    #[error("Reddit API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed listing: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }

    /// Server-supplied wait, only ever present on a rate-limit signal.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
