//! Source kinds, status enums, error kinds, and tiers for Sitelens.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// External data source an audit can draw from.
///
/// Variant order is the canonical order used when storing requested sources.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Technical crawl (meta tags, content, links).
    Technical,
    /// Rank-tracking snapshot from SerpBear.
    Ranking,
    /// Lighthouse CI performance audit.
    Performance,
    /// LLM content analysis.
    #[serde(alias = "ai-insight")]
    AiInsight,
}

impl SourceKind {
    pub const ALL: [Self; 4] = [
        Self::Technical,
        Self::Ranking,
        Self::Performance,
        Self::AiInsight,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Ranking => "ranking",
            Self::Performance => "performance",
            Self::AiInsight => "ai_insight",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "technical" => Ok(Self::Technical),
            "ranking" => Ok(Self::Ranking),
            "performance" => Ok(Self::Performance),
            "ai_insight" | "ai-insight" => Ok(Self::AiInsight),
            other => Err(CoreError::Validation(format!("unknown source '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// SourceStatus
// ---------------------------------------------------------------------------

/// Terminal outcome of one adapter call.
///
/// There is no pending variant. A `SourceResult` only exists
/// once its adapter call has finished, timed out, or been cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Success,
    Partial,
    Failed,
}

impl SourceStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReportStatus
// ---------------------------------------------------------------------------

/// Overall status of a persisted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Complete,
    Partial,
    Failed,
}

impl ReportStatus {
    /// Derive the report status from its source statuses.
    ///
    /// All success → `Complete`; all failed (or none) → `Failed`;
    /// anything in between → `Partial`.
    #[must_use]
    pub fn from_source_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = SourceStatus>,
    {
        let mut total = 0usize;
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for status in statuses {
            total += 1;
            match status {
                SourceStatus::Success => succeeded += 1,
                SourceStatus::Failed => failed += 1,
                SourceStatus::Partial => {}
            }
        }

        if total == 0 || failed == total {
            Self::Failed
        } else if succeeded == total {
            Self::Complete
        } else {
            Self::Partial
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RequestStatus
// ---------------------------------------------------------------------------

/// Lifecycle of an audit request.
///
/// ```text
/// queued → running → complete
///                  → partial
///                  → failed
///                  → cancelled
/// queued → cancelled
/// queued → failed (could not start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    Running,
    Complete,
    Partial,
    Failed,
    Cancelled,
}

impl RequestStatus {
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Queued => &[Self::Running, Self::Cancelled, Self::Failed],
            Self::Running => &[Self::Complete, Self::Partial, Self::Failed, Self::Cancelled],
            Self::Complete | Self::Partial | Self::Failed | Self::Cancelled => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether the request has finished (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Partial | Self::Failed | Self::Cancelled
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<ReportStatus> for RequestStatus {
    fn from(status: ReportStatus) -> Self {
        match status {
            ReportStatus::Complete => Self::Complete,
            ReportStatus::Partial => Self::Partial,
            ReportStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Why a source result failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The adapter did not answer within its timeout or the aggregation deadline.
    AdapterTimeout,
    /// Transport failure or non-success HTTP status.
    AdapterHttpError,
    /// Upstream answered 429.
    RateLimited,
    /// Upstream payload could not be decoded.
    Parse,
    /// Upstream answered but had no data for the site.
    EmptyResult,
    /// The adapter has no endpoint or credentials configured.
    NotConfigured,
    /// The audit request was cancelled before the call finished.
    Cancelled,
}

impl ErrorKind {
    /// Whether a retry may plausibly succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::AdapterTimeout | Self::AdapterHttpError | Self::RateLimited
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdapterTimeout => "adapter_timeout",
            Self::AdapterHttpError => "adapter_http_error",
            Self::RateLimited => "rate_limited",
            Self::Parse => "parse",
            Self::EmptyResult => "empty_result",
            Self::NotConfigured => "not_configured",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SiteTier
// ---------------------------------------------------------------------------

/// Plan a site belongs to. Limits live in [`crate::tier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SiteTier {
    Demo,
    Starter,
    Pro,
    Enterprise,
    Agency,
    Internal,
}

impl SiteTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
            Self::Agency => "agency",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for SiteTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(Self::Demo),
            "starter" => Ok(Self::Starter),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            "agency" => Ok(Self::Agency),
            "internal" => Ok(Self::Internal),
            other => Err(CoreError::Validation(format!("unknown tier '{other}'"))),
        }
    }
}
