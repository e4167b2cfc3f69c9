use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{RequestStatus, SourceKind};
use crate::errors::CoreError;

/// One logical request to refresh a site's report from one or more sources.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuditRequest {
    /// Correlation id handed back to the caller.
    pub id: String,
    pub site_id: String,
    /// Requested sources in canonical order, without duplicates.
    pub sources: Vec<SourceKind>,
    pub status: RequestStatus,
    /// Caller-supplied deadline. Reaching it cancels the request.
    pub deadline: Option<DateTime<Utc>>,
    /// Version of the report this request produced.
    pub report_version: Option<i64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sort and de-duplicate a source selection.
///
/// # Errors
///
/// Returns `CoreError::Validation` if the selection is empty.
pub fn normalize_sources(mut sources: Vec<SourceKind>) -> Result<Vec<SourceKind>, CoreError> {
    sources.sort_unstable();
    sources.dedup();
    if sources.is_empty() {
        return Err(CoreError::Validation(
            "at least one source must be requested".to_string(),
        ));
    }
    Ok(sources)
}
