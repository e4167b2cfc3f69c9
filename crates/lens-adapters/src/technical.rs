//! Technical crawl service client.
//!
//! `POST {base}/crawl {url, max_pages}` answers with the pages crawled and a
//! flat list of pass/fail checks. The headline score is the share of passed
//! checks.

use std::time::Duration;

use async_trait::async_trait;
use lens_config::TechnicalConfig;
use lens_core::entities::{NormalizedPayload, PayloadItem, Site, SourceResult};
use lens_core::enums::SourceKind;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::{check_response, join_url};
use crate::{FetchContext, SourceAdapter, count, guarded, percent};

#[derive(Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    max_pages: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CrawlResponse {
    #[serde(default)]
    pages_crawled: u64,
    #[serde(default)]
    checks: Vec<CrawlCheck>,
}

#[derive(Debug, Deserialize)]
struct CrawlCheck {
    id: String,
    passed: bool,
    #[serde(default = "default_severity")]
    severity: String,
    #[serde(default)]
    message: String,
}

fn default_severity() -> String {
    "info".to_string()
}

pub struct TechnicalAdapter {
    http: reqwest::Client,
    config: TechnicalConfig,
}

impl TechnicalAdapter {
    #[must_use]
    pub const fn new(http: reqwest::Client, config: TechnicalConfig) -> Self {
        Self { http, config }
    }

    async fn crawl(&self, site: &Site) -> Result<SourceResult, AdapterError> {
        if !self.config.is_configured() {
            return Err(AdapterError::NotConfigured("technical crawl service"));
        }
        let url = join_url(&self.config.base_url, "crawl");
        let mut request = self.http.post(&url).json(&CrawlRequest {
            url: &site.url,
            max_pages: self.config.max_pages,
        });
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }
        let resp = check_response(request.send().await?).await?;
        let body: CrawlResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(normalize(body))
    }
}

#[async_trait]
impl SourceAdapter for TechnicalAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Technical
    }

    async fn fetch(&self, site: &Site, ctx: &FetchContext) -> SourceResult {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        guarded(self.kind(), timeout, ctx, self.crawl(site)).await
    }
}

pub(crate) fn normalize(body: CrawlResponse) -> SourceResult {
    let total = body.checks.len();
    let failed: Vec<&CrawlCheck> = body.checks.iter().filter(|c| !c.passed).collect();
    let critical = failed
        .iter()
        .filter(|c| c.severity.eq_ignore_ascii_case("critical"))
        .count();

    #[allow(clippy::cast_precision_loss)]
    let pages = body.pages_crawled as f64;
    let payload = NormalizedPayload {
        score: percent(total - failed.len(), total),
        items: failed
            .iter()
            .map(|c| PayloadItem {
                label: c.id.clone(),
                value: None,
                detail: Some(format!("{}: {}", c.severity, c.message)),
            })
            .collect(),
        summary: Some(format!(
            "{} of {total} checks failed across {} pages",
            failed.len(),
            body.pages_crawled
        )),
        ..Default::default()
    }
    .with_metric("pages_crawled", pages)
    .with_metric("checks_total", count(total))
    .with_metric("checks_failed", count(failed.len()))
    .with_metric("critical_failures", count(critical));

    if total == 0 {
        SourceResult::partial(SourceKind::Technical, payload, "crawl returned no checks")
    } else {
        SourceResult::success(SourceKind::Technical, payload)
    }
}
