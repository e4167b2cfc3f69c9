use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::NormalizedPayload;
use crate::enums::{ErrorKind, SourceKind, SourceStatus};

/// Normalized outcome of one external adapter call.
///
/// `error_kind` is set exactly when `status` is `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SourceResult {
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    /// Attempts spent, including the final one.
    pub attempts: u32,
    pub fetched_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub payload: NormalizedPayload,
}

impl SourceResult {
    #[must_use]
    pub fn success(kind: SourceKind, payload: NormalizedPayload) -> Self {
        Self::new(kind, SourceStatus::Success, None, None, payload)
    }

    /// Usable data with gaps. `note` says what is missing.
    #[must_use]
    pub fn partial(kind: SourceKind, payload: NormalizedPayload, note: impl Into<String>) -> Self {
        Self::new(kind, SourceStatus::Partial, None, Some(note.into()), payload)
    }

    #[must_use]
    pub fn failed(kind: SourceKind, error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(
            kind,
            SourceStatus::Failed,
            Some(error_kind),
            Some(message.into()),
            NormalizedPayload::default(),
        )
    }

    fn new(
        kind: SourceKind,
        status: SourceStatus,
        error_kind: Option<ErrorKind>,
        error: Option<String>,
        payload: NormalizedPayload,
    ) -> Self {
        Self {
            kind,
            status,
            error_kind,
            error,
            attempts: 1,
            fetched_at: Utc::now(),
            elapsed_ms: 0,
            payload,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed)
    }

    /// Failed with an error kind worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_failed() && self.error_kind.is_some_and(ErrorKind::is_retryable)
    }

    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed: std::time::Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }
}
