//! Caller-facing error type for audit operations.

use lens_core::errors::CoreError;
use lens_db::error::DatabaseError;
use thiserror::Error;

/// Errors surfaced to callers of the orchestration API.
///
/// Adapter failures never appear here; they are recorded on the report.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The request is malformed or exceeds the site's tier limits.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A site, request, or report does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Another request for the site is queued or running (reject policy).
    #[error("audit {request_id} is already in progress for site {site_id}")]
    ConcurrentAuditInProgress { site_id: String, request_id: String },

    /// The request is not in a state that allows the operation.
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    /// Persistence failed.
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AuditError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, id } => Self::NotFound {
                entity: entity.to_string(),
                id,
            },
            DatabaseError::InvalidTransition { id, from, to } => {
                Self::InvalidTransition { id, from, to }
            }
            other => Self::Database(other),
        }
    }
}

impl From<CoreError> for AuditError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            CoreError::InvalidTransition { id, from, to, .. } => {
                Self::InvalidTransition { id, from, to }
            }
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Other(e) => Self::Database(DatabaseError::Other(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_not_found_maps_to_not_found() {
        let err = AuditError::from(DatabaseError::NotFound {
            entity: "site",
            id: "sit-1".into(),
        });
        assert!(matches!(err, AuditError::NotFound { ref entity, .. } if entity == "site"));
    }

    #[test]
    fn other_database_errors_stay_database() {
        let err = AuditError::from(DatabaseError::NoResult);
        assert!(matches!(err, AuditError::Database(_)));
    }

    #[test]
    fn core_validation_maps_to_validation() {
        let err = AuditError::from(CoreError::Validation("bad".into()));
        assert_eq!(err.to_string(), "Validation error: bad");
    }
}
