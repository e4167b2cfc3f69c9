//! # lens-adapters
//!
//! HTTP adapters for the upstream sources a Sitelens audit draws on:
//! - technical crawl service (`technical`)
//! - `SerpBear` rank tracking (`ranking`)
//! - Lighthouse CI server (`performance`)
//! - LLM content analysis (`ai_insight`)
//!
//! Every adapter implements [`SourceAdapter`]. A fetch never returns an
//! error: remote failures become a failed [`SourceResult`] tagged with an
//! `ErrorKind`. Adapters bound each fetch with their own timeout and do not
//! retry; retry policy belongs to the aggregator.

pub mod lighthouse;
pub mod llm;
pub mod serpbear;
pub mod technical;

mod error;
mod http;

pub use error::AdapterError;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lens_config::LensConfig;
use lens_core::entities::{Site, SourceResult};
use lens_core::enums::SourceKind;

// ── Types ──────────────────────────────────────────────────────────

/// Per-call context handed to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchContext {
    /// Correlation id of the audit request.
    pub request_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Keyword cap from the site's tier. `None` = unlimited.
    pub max_keywords: Option<usize>,
}

/// One upstream source.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Fetch and normalize data for `site`. Always yields a terminal result.
    async fn fetch(&self, site: &Site, ctx: &FetchContext) -> SourceResult;
}

/// Run one adapter call under `timeout`, stamping elapsed time and folding
/// errors into a failed result.
pub async fn guarded<F>(kind: SourceKind, timeout: Duration, ctx: &FetchContext, call: F) -> SourceResult
where
    F: Future<Output = Result<SourceResult, AdapterError>>,
{
    let started = Instant::now();
    let outcome = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout(timeout.as_secs())),
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                source = %kind,
                request_id = %ctx.request_id,
                attempt = ctx.attempt,
                %e,
                "source fetch failed"
            );
            SourceResult::failed(kind, e.kind(), e.to_string())
        }
    };
    result.with_elapsed(started.elapsed())
}

// ── Client ─────────────────────────────────────────────────────────

/// Build the HTTP client shared by all adapters.
///
/// # Errors
///
/// Returns [`AdapterError::Http`] if the TLS backend cannot be initialized.
pub fn http_client() -> Result<reqwest::Client, AdapterError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("sitelens/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

/// Adapters keyed by the source they serve.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: BTreeMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four production adapters from config.
    ///
    /// Unconfigured sections still get an adapter; it answers every fetch
    /// with a failed `not_configured` result.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if the HTTP client cannot be built.
    pub fn from_config(config: &LensConfig) -> Result<Self, AdapterError> {
        let http = http_client()?;
        Ok(Self::new()
            .with(technical::TechnicalAdapter::new(http.clone(), config.technical.clone()))
            .with(serpbear::SerpBearAdapter::new(http.clone(), config.serpbear.clone()))
            .with(lighthouse::LighthouseAdapter::new(http.clone(), config.lighthouse.clone()))
            .with(llm::LlmAdapter::new(http, config.llm.clone())))
    }

    /// Register an adapter, replacing any previous one for the same kind.
    #[must_use]
    pub fn with(mut self, adapter: impl SourceAdapter + 'static) -> Self {
        self.insert(Arc::new(adapter));
        self
    }

    pub fn insert(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    #[must_use]
    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Kinds with a registered adapter, in canonical order.
    pub fn kinds(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.adapters.keys().copied()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.kinds()).finish()
    }
}

/// Round to one decimal place.
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole × 100`, rounded to one decimal. `None` when `whole` is zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percent(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| round1(part as f64 / whole as f64 * 100.0))
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn count(n: usize) -> f64 {
    n as f64
}
