use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{SiteScores, SourceResult};
use crate::enums::{ReportStatus, SourceKind};
use crate::errors::CoreError;

/// Versioned, immutable aggregate of source results for a site.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Report {
    pub id: String,
    pub site_id: String,
    /// Per-site version, 1-based and gapless.
    pub version: i64,
    pub request_id: String,
    pub status: ReportStatus,
    pub overall_score: Option<f64>,
    pub note: Option<String>,
    /// One result per requested source, in canonical source order.
    pub results: Vec<SourceResult>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    #[must_use]
    pub fn result(&self, kind: SourceKind) -> Option<&SourceResult> {
        self.results.iter().find(|r| r.kind == kind)
    }

    /// Scores to cache on the site after this report is saved.
    ///
    /// Category scores come from the performance audit; the technical crawl
    /// score stands in for `seo_score` when no performance result is usable.
    #[must_use]
    pub fn site_scores(&self) -> SiteScores {
        let usable = |kind| self.result(kind).filter(|r| !r.is_failed());
        let perf = usable(SourceKind::Performance).map(|r| &r.payload);
        let technical = usable(SourceKind::Technical).and_then(|r| r.payload.score);
        SiteScores {
            last_audit_at: Some(self.created_at),
            last_audit_score: self.overall_score,
            performance_score: perf.and_then(|p| p.metric("performance")),
            seo_score: perf.and_then(|p| p.metric("seo")).or(technical),
            accessibility_score: perf.and_then(|p| p.metric("accessibility")),
            best_practices_score: perf.and_then(|p| p.metric("best_practices")),
        }
    }
}

/// Window into a site's report history, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRange {
    /// Only versions strictly below this one.
    pub before_version: Option<i64>,
    pub limit: u32,
}

impl HistoryRange {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 200;

    /// Build a range, clamping `limit` to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(before_version: Option<i64>, limit: Option<u32>) -> Self {
        Self {
            before_version,
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for HistoryRange {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A fully aggregated report awaiting a version number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub site_id: String,
    pub request_id: String,
    pub requested: Vec<SourceKind>,
    pub status: ReportStatus,
    pub overall_score: Option<f64>,
    pub note: Option<String>,
    pub results: Vec<SourceResult>,
}

impl NewReport {
    /// Build a report from terminal results, deriving status and score.
    #[must_use]
    pub fn assemble(
        site_id: impl Into<String>,
        request_id: impl Into<String>,
        requested: Vec<SourceKind>,
        mut results: Vec<SourceResult>,
    ) -> Self {
        results.sort_by_key(|r| r.kind);
        let status = ReportStatus::from_source_statuses(results.iter().map(|r| r.status));
        let overall_score = mean_score(&results);
        Self {
            site_id: site_id.into(),
            request_id: request_id.into(),
            requested,
            status,
            overall_score,
            note: None,
            results,
        }
    }

    /// Mark the report as cancelled: status `Failed` with the given note.
    #[must_use]
    pub fn cancelled(mut self, note: impl Into<String>) -> Self {
        self.status = ReportStatus::Failed;
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Verify there is exactly one result per requested source and that
    /// every failed result names its error kind.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` describing the first violation.
    pub fn check_complete(&self) -> Result<(), CoreError> {
        for kind in &self.requested {
            let count = self.results.iter().filter(|r| r.kind == *kind).count();
            if count != 1 {
                return Err(CoreError::Validation(format!(
                    "report for request {} has {count} result(s) for source '{kind}'",
                    self.request_id
                )));
            }
        }
        if let Some(extra) = self.results.iter().find(|r| !self.requested.contains(&r.kind)) {
            return Err(CoreError::Validation(format!(
                "report for request {} has an unrequested source '{}'",
                self.request_id, extra.kind
            )));
        }
        if let Some(bad) = self.results.iter().find(|r| r.is_failed() && r.error_kind.is_none()) {
            return Err(CoreError::Validation(format!(
                "failed source '{}' has no error kind",
                bad.kind
            )));
        }
        Ok(())
    }
}

fn mean_score(results: &[SourceResult]) -> Option<f64> {
    let scores: Vec<f64> = results
        .iter()
        .filter(|r| !r.is_failed())
        .filter_map(|r| r.payload.score)
        .collect();
    if scores.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
