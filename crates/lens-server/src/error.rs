//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"error": {"code", "message"}}` with a
//! status derived from the `AuditError` variant.

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use lens_adapters::AdapterError;
use lens_audit::AuditError;
use lens_db::error::DatabaseError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Errors returned by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong API key.
    #[error("missing or invalid API key")]
    Unauthorized,

    /// Body or query string could not be decoded.
    #[error("{0}")]
    BadRequest(String),

    /// A dependency (the database) is not answering.
    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Serialized form of an [`ApiError`].
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::Audit(AuditError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Audit(AuditError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Audit(
                AuditError::ConcurrentAuditInProgress { .. } | AuditError::InvalidTransition { .. },
            ) => StatusCode::CONFLICT,
            Self::Audit(AuditError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Unavailable(_) => "unavailable",
            Self::Audit(AuditError::Validation(_)) => "validation",
            Self::Audit(AuditError::NotFound { .. }) => "not_found",
            Self::Audit(AuditError::ConcurrentAuditInProgress { .. }) => {
                "concurrent_audit_in_progress"
            }
            Self::Audit(AuditError::InvalidTransition { .. }) => "invalid_transition",
            Self::Audit(AuditError::Database(_)) => "database",
        }
    }

    fn body(&self) -> ErrorBody {
        let message = match self {
            // Storage details stay in the log.
            Self::Audit(AuditError::Database(_)) => "internal storage error".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            code: self.code(),
            message,
        }
    }
}

pub(crate) fn api_error_response(status: StatusCode, err: ErrorBody) -> Response {
    let body = Json(json!({ "error": err }));
    let mut resp = (status, body).into_response();
    if matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        resp.headers_mut()
            .insert("retry-after", HeaderValue::from_static("5"));
    }
    resp
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        api_error_response(status, self.body())
    }
}

/// Startup failures of [`crate::serve`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database: {0}")]
    Database(#[from] DatabaseError),

    #[error("adapters: {0}")]
    Adapters(#[from] AdapterError),

    #[error("recovery: {0}")]
    Recovery(#[from] AuditError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}
