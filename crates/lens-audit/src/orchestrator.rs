//! In-process orchestration API.
//!
//! `submit` validates a request, records it as `queued`, and spawns its
//! aggregation. The aggregation waits for the site lock, runs, saves the
//! report, and moves the request to its terminal status. Callers poll with
//! `status`, block with `wait`, or stop it with `cancel`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use lens_adapters::AdapterSet;
use lens_config::{AggregatorConfig, ContentionPolicy};
use lens_core::entities::{
    AuditRequest, HistoryRange, Report, Site, normalize_sources, validate_site_url,
};
use lens_core::enums::{RequestStatus, SiteTier, SourceKind};
use lens_db::repos::requests::StatusUpdate;
use lens_db::service::LensService;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::aggregator::Aggregator;
use crate::error::AuditError;
use crate::locks::SiteLocks;
use crate::policy::AggregationPolicy;

/// Audits whose aggregation task is still alive.
struct InFlight {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

struct Inner {
    db: Arc<LensService>,
    aggregator: Aggregator,
    locks: SiteLocks,
    contention: ContentionPolicy,
    /// Serializes the checks and insert in `submit`.
    admission: tokio::sync::Mutex<()>,
    inflight: Mutex<HashMap<String, InFlight>>,
}

/// Handle to the audit workflow. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(db: Arc<LensService>, adapters: AdapterSet, config: &AggregatorConfig) -> Self {
        let aggregator = Aggregator::new(Arc::clone(&db), adapters, AggregationPolicy::from(config));
        Self {
            inner: Arc::new(Inner {
                db,
                aggregator,
                locks: SiteLocks::new(),
                contention: config.contention,
                admission: tokio::sync::Mutex::new(()),
                inflight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Fail requests a previous process left queued or running.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Database` if the update fails.
    pub async fn recover_interrupted(&self) -> Result<u64, AuditError> {
        Ok(self.inner.db.fail_interrupted_requests().await?)
    }

    #[must_use]
    pub fn db(&self) -> &LensService {
        &self.inner.db
    }

    // ── Sites ──────────────────────────────────────────────────────

    /// Register a site after validating its URL.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::Validation` for a bad URL or empty tenant.
    pub async fn register_site(
        &self,
        tenant_id: &str,
        url: &str,
        name: Option<&str>,
        tier: SiteTier,
    ) -> Result<Site, AuditError> {
        if tenant_id.trim().is_empty() {
            return Err(AuditError::Validation("tenant_id must not be empty".into()));
        }
        validate_site_url(url)?;
        Ok(self
            .inner
            .db
            .create_site(tenant_id.trim(), url, name, tier)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the site does not exist.
    pub async fn site(&self, site_id: &str) -> Result<Site, AuditError> {
        Ok(self.inner.db.get_site(site_id).await?)
    }

    /// # Errors
    ///
    /// Returns `AuditError::Database` if the query fails.
    pub async fn sites(&self, tenant_id: Option<&str>) -> Result<Vec<Site>, AuditError> {
        Ok(self.inner.db.list_sites(tenant_id).await?)
    }

    // ── Audits ─────────────────────────────────────────────────────

    /// Validate and enqueue an audit. Returns immediately with the queued
    /// request; the aggregation runs in the background.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the site does not exist.
    /// - `Validation` for an inactive site, empty or disallowed sources, a
    ///   zero deadline, or an exhausted daily quota.
    /// - `ConcurrentAuditInProgress` under the reject policy.
    pub async fn submit(
        &self,
        site_id: &str,
        sources: Vec<SourceKind>,
        deadline_secs: Option<u64>,
    ) -> Result<AuditRequest, AuditError> {
        let site = self.inner.db.get_site(site_id).await?;
        if !site.active {
            return Err(AuditError::Validation(format!("site {site_id} is inactive")));
        }
        let sources = normalize_sources(sources)?;
        let limits = site.tier.limits();
        limits.check_sources(site.tier, &sources)?;
        let deadline = match deadline_secs {
            Some(0) => return Err(AuditError::Validation("deadline_secs must be positive".into())),
            Some(secs) => {
                let secs = i64::try_from(secs)
                    .map_err(|_| AuditError::Validation("deadline_secs is too large".into()))?;
                Some(Utc::now() + chrono::Duration::seconds(secs))
            }
            None => None,
        };

        let request = {
            let _admission = self.inner.admission.lock().await;
            let since = Utc::now() - chrono::Duration::hours(24);
            let recent = self.inner.db.count_requests_since(site_id, since).await?;
            limits.check_frequency(site.tier, recent)?;

            if self.inner.contention == ContentionPolicy::Reject {
                if let Some(active) = self.inner.db.active_request_for_site(site_id).await? {
                    return Err(AuditError::ConcurrentAuditInProgress {
                        site_id: site_id.to_string(),
                        request_id: active.id,
                    });
                }
            }
            self.inner.db.create_request(site_id, &sources, deadline).await?
        };

        tracing::info!(request_id = %request.id, site_id, ?sources, "audit queued");
        self.spawn(request.clone(), site);
        Ok(request)
    }

    fn spawn(&self, request: AuditRequest, site: Site) {
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        self.inflight().insert(
            request.id.clone(),
            InFlight {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let request_id = request.id.clone();
            if let Err(e) = run_request(&inner, request, site, cancel).await {
                tracing::error!(%request_id, %e, "audit request failed");
                let update = StatusUpdate {
                    report_version: None,
                    error: Some(e.to_string()),
                };
                if let Err(e) = inner
                    .db
                    .update_request_status(&request_id, RequestStatus::Failed, update)
                    .await
                {
                    tracing::warn!(%request_id, %e, "could not mark request failed");
                }
            }
            inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&request_id);
            done_tx.send_replace(true);
        });
    }

    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the request does not exist.
    pub async fn status(&self, request_id: &str) -> Result<AuditRequest, AuditError> {
        Ok(self.inner.db.get_request(request_id).await?)
    }

    /// Latest report, or a specific version.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the site has no such report.
    pub async fn report(&self, site_id: &str, version: Option<i64>) -> Result<Report, AuditError> {
        let report = match version {
            Some(version) => self.inner.db.get_report(site_id, version).await?,
            None => self.inner.db.latest_report(site_id).await?,
        };
        Ok(report)
    }

    /// Reports newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the site does not exist.
    pub async fn history(&self, site_id: &str, range: HistoryRange) -> Result<Vec<Report>, AuditError> {
        self.inner.db.get_site(site_id).await?;
        Ok(self.inner.db.report_history(site_id, range).await?)
    }

    /// Cancel a queued or running request and wait for it to settle.
    ///
    /// A running request still gets a (failed) report version; a queued one
    /// does not.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::InvalidTransition` if the request is already
    /// terminal or finishes before the cancellation takes effect, or
    /// `NotFound` if it does not exist.
    pub async fn cancel(&self, request_id: &str) -> Result<AuditRequest, AuditError> {
        let request = self.inner.db.get_request(request_id).await?;
        if request.status.is_terminal() {
            return Err(AuditError::InvalidTransition {
                id: request_id.to_string(),
                from: request.status.to_string(),
                to: RequestStatus::Cancelled.to_string(),
            });
        }

        let token = self
            .inflight()
            .get(request_id)
            .map(|f| f.cancel.clone());
        match token {
            Some(token) => {
                tracing::info!(request_id, "cancelling audit");
                token.cancel();
                let settled = self.wait(request_id, None).await?;
                // The aggregation may have passed the point where it observes
                // the token and finished on its own.
                if settled.status == RequestStatus::Cancelled {
                    Ok(settled)
                } else {
                    Err(AuditError::InvalidTransition {
                        id: request_id.to_string(),
                        from: settled.status.to_string(),
                        to: RequestStatus::Cancelled.to_string(),
                    })
                }
            }
            None => Ok(self
                .inner
                .db
                .update_request_status(request_id, RequestStatus::Cancelled, StatusUpdate::default())
                .await?),
        }
    }

    /// Wait until the request reaches a terminal status, or `timeout` passes.
    /// Returns the request as last stored.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::NotFound` if the request does not exist.
    pub async fn wait(
        &self,
        request_id: &str,
        timeout: Option<Duration>,
    ) -> Result<AuditRequest, AuditError> {
        let done = self.inflight().get(request_id).map(|f| f.done.clone());
        if let Some(mut done) = done {
            let finished = async {
                // An Err means the task is gone, which also means it finished.
                let _ = done.wait_for(|finished| *finished).await;
            };
            match timeout {
                Some(limit) => {
                    let _ = tokio::time::timeout(limit, finished).await;
                }
                None => finished.await,
            }
        }
        self.status(request_id).await
    }

    /// Number of audits with a live aggregation task.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight().len()
    }

    fn inflight(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlight>> {
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of the background task for one request.
async fn run_request(
    inner: &Inner,
    request: AuditRequest,
    site: Site,
    cancel: CancellationToken,
) -> Result<(), AuditError> {
    let caller_deadline = request.deadline.map(|at| {
        let remaining = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::Instant::now() + remaining
    });
    let queued_until = async {
        match caller_deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    let guard = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        () = queued_until => None,
        guard = inner.locks.lock(&site.id) => Some(guard),
    };
    let Some(_guard) = guard else {
        let note = if cancel.is_cancelled() {
            "cancelled while queued"
        } else {
            "cancelled: caller deadline reached while queued"
        };
        tracing::info!(request_id = %request.id, note, "audit dropped before running");
        inner
            .db
            .update_request_status(
                &request.id,
                RequestStatus::Cancelled,
                StatusUpdate {
                    report_version: None,
                    error: Some(note.to_string()),
                },
            )
            .await?;
        return Ok(());
    };

    inner
        .db
        .update_request_status(&request.id, RequestStatus::Running, StatusUpdate::default())
        .await?;

    let aggregation = inner.aggregator.run(&request, &site, &cancel).await?;
    let report = aggregation.report;
    let status = match aggregation.interrupted {
        Some(reason) if reason.is_cancellation() => RequestStatus::Cancelled,
        _ => RequestStatus::from(report.status),
    };
    let error = aggregation.interrupted.and(report.note.clone());

    inner
        .db
        .update_request_status(
            &request.id,
            status,
            StatusUpdate {
                report_version: Some(report.version),
                error,
            },
        )
        .await?;

    tracing::info!(
        request_id = %request.id,
        site_id = %site.id,
        version = report.version,
        status = %status,
        "audit finished"
    );
    Ok(())
}
