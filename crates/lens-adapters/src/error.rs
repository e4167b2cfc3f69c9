//! Adapter error types.

use lens_core::enums::ErrorKind;
use thiserror::Error;

/// Errors raised while talking to an upstream source.
///
/// None of these escape an adapter: `guarded` folds them into a failed
/// `SourceResult` tagged with [`AdapterError::kind`].
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream API returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the upstream.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The upstream returned a 429 Too Many Requests response.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The whole fetch exceeded the adapter timeout.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Failed to parse an upstream response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The upstream answered but had nothing for this site.
    #[error("no data: {0}")]
    EmptyResult(String),

    /// Required settings for the source are missing.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl AdapterError {
    /// The `ErrorKind` recorded on the failed source result.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(e) if e.is_timeout() => ErrorKind::AdapterTimeout,
            Self::Http(e) if e.is_decode() => ErrorKind::Parse,
            Self::Http(_) | Self::Api { .. } => ErrorKind::AdapterHttpError,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::AdapterTimeout,
            Self::Parse(_) => ErrorKind::Parse,
            Self::EmptyResult(_) => ErrorKind::EmptyResult,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}
