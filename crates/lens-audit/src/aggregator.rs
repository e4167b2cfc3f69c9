//! Concurrent fan-out of one audit request to its sources.
//!
//! Each requested source runs in its own task with retries. Collection stops
//! when every task has finished, the deadline passes, or the request is
//! cancelled. Whatever happens, every requested source ends with exactly one
//! terminal `SourceResult` and the report is saved under the next version.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lens_adapters::{AdapterSet, FetchContext, SourceAdapter};
use lens_core::entities::{AuditRequest, NewReport, Report, Site, SourceResult};
use lens_core::enums::{ErrorKind, SourceKind};
use lens_db::service::LensService;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AuditError;
use crate::policy::AggregationPolicy;

/// Why collection stopped before every source finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// The global aggregation deadline passed.
    GlobalDeadline,
    /// The caller's deadline passed.
    CallerDeadline,
    /// The request was cancelled explicitly.
    Cancelled,
}

impl Interruption {
    const fn note(self) -> &'static str {
        match self {
            Self::GlobalDeadline => "aggregation deadline reached",
            Self::CallerDeadline => "cancelled: caller deadline reached",
            Self::Cancelled => "cancelled by caller",
        }
    }

    /// Whether pending sources count as cancelled rather than timed out.
    pub const fn is_cancellation(self) -> bool {
        !matches!(self, Self::GlobalDeadline)
    }
}

/// Outcome of one aggregation.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub report: Report,
    pub interrupted: Option<Interruption>,
}

pub struct Aggregator {
    db: Arc<LensService>,
    adapters: AdapterSet,
    policy: AggregationPolicy,
}

impl Aggregator {
    #[must_use]
    pub const fn new(db: Arc<LensService>, adapters: AdapterSet, policy: AggregationPolicy) -> Self {
        Self {
            db,
            adapters,
            policy,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    /// Run every requested source for `request`, save the report, and refresh
    /// the site's cached scores.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Database` if the report cannot be saved. Source
    /// failures are recorded on the report instead.
    pub async fn run(
        &self,
        request: &AuditRequest,
        site: &Site,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AuditError> {
        let (deadline, caller_bound) = self.effective_deadline(request);
        let site = Arc::new(site.clone());
        let max_keywords = site.tier.limits().max_keywords;

        let mut results = Vec::with_capacity(request.sources.len());
        let mut pending: BTreeSet<SourceKind> = BTreeSet::new();
        let mut tasks = JoinSet::new();

        for &kind in &request.sources {
            let Some(adapter) = self.adapters.get(kind) else {
                results.push(SourceResult::failed(
                    kind,
                    ErrorKind::NotConfigured,
                    format!("no adapter registered for {kind}"),
                ));
                continue;
            };
            let ctx = FetchContext {
                request_id: request.id.clone(),
                attempt: 1,
                max_keywords,
            };
            pending.insert(kind);
            tasks.spawn(fetch_with_retry(adapter, Arc::clone(&site), ctx, self.policy));
        }

        tracing::info!(
            request_id = %request.id,
            site_id = %site.id,
            sources = request.sources.len(),
            "aggregation started"
        );

        let interrupted = tokio::select! {
            biased;
            () = cancel.cancelled() => Some(Interruption::Cancelled),
            done = tokio::time::timeout_at(deadline, collect(&mut tasks, &mut results, &mut pending)) => {
                match done {
                    Ok(()) => None,
                    Err(_) if caller_bound => Some(Interruption::CallerDeadline),
                    Err(_) => Some(Interruption::GlobalDeadline),
                }
            }
        };
        tasks.abort_all();

        if let Some(reason) = interrupted {
            let error_kind = if reason.is_cancellation() {
                ErrorKind::Cancelled
            } else {
                ErrorKind::AdapterTimeout
            };
            tracing::warn!(
                request_id = %request.id,
                pending = pending.len(),
                reason = reason.note(),
                "aggregation interrupted"
            );
            for kind in std::mem::take(&mut pending) {
                results.push(SourceResult::failed(kind, error_kind, reason.note()));
            }
        }

        for kind in pending {
            results.push(SourceResult::failed(
                kind,
                ErrorKind::AdapterHttpError,
                "adapter task ended without a result",
            ));
        }

        let mut report = NewReport::assemble(&site.id, &request.id, request.sources.clone(), results);
        match interrupted {
            Some(reason) if reason.is_cancellation() => report = report.cancelled(reason.note()),
            Some(reason) => report = report.with_note(reason.note()),
            None => {}
        }

        let report = self.db.save_report(report).await?;
        if let Err(e) = self
            .db
            .update_site_scores(&site.id, &report.site_scores())
            .await
        {
            tracing::warn!(site_id = %site.id, %e, "failed to refresh cached site scores");
        }

        Ok(Aggregation {
            report,
            interrupted,
        })
    }

    /// The earlier of the global deadline and the caller's, and whether the
    /// caller's is the binding one.
    fn effective_deadline(&self, request: &AuditRequest) -> (Instant, bool) {
        let now = Instant::now();
        let global = now + self.policy.deadline;
        match request.deadline {
            Some(at) => {
                let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                let caller = now + remaining;
                if caller <= global {
                    (caller, true)
                } else {
                    (global, false)
                }
            }
            None => (global, false),
        }
    }
}

/// Drain finished source tasks into `results`.
async fn collect(
    tasks: &mut JoinSet<SourceResult>,
    results: &mut Vec<SourceResult>,
    pending: &mut BTreeSet<SourceKind>,
) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                pending.remove(&result.kind);
                results.push(result);
            }
            Err(e) => tracing::warn!(%e, "source task failed"),
        }
    }
}

/// Call one adapter until it succeeds, fails with a non-retryable kind, or
/// runs out of attempts.
async fn fetch_with_retry(
    adapter: Arc<dyn SourceAdapter>,
    site: Arc<Site>,
    mut ctx: FetchContext,
    policy: AggregationPolicy,
) -> SourceResult {
    let started = std::time::Instant::now();
    let mut attempt = 1;
    loop {
        ctx.attempt = attempt;
        let result = adapter.fetch(&site, &ctx).await;
        if !result.is_retryable() || attempt >= policy.max_attempts {
            return result.with_attempts(attempt).with_elapsed(started.elapsed());
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            source = %result.kind,
            request_id = %ctx.request_id,
            attempt,
            ?delay,
            error = result.error.as_deref().unwrap_or_default(),
            "retrying source"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
