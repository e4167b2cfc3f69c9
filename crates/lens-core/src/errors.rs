//! Cross-cutting error types for Sitelens.
//!
//! Domain-specific errors (e.g., `DatabaseError`, `AdapterError`) are defined in
//! their respective crates. Caller-facing errors converge in `lens-audit`.

use thiserror::Error;

/// Errors that can be raised by any Sitelens crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (format, constraints, tier limits).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
