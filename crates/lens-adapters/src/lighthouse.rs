//! Lighthouse CI server client.
//!
//! Reads the latest build of the configured project, then its representative
//! runs, and normalizes the Lighthouse result (`lhr`) of the run matching the
//! site URL. LHCI stores `lhr` as a JSON string; an inline object is accepted
//! too.

use std::time::Duration;

use async_trait::async_trait;
use lens_config::LighthouseConfig;
use lens_core::entities::{NormalizedPayload, Site, SourceResult, parse_site_url};
use lens_core::enums::SourceKind;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::AdapterError;
use crate::http::{check_response, join_url};
use crate::{FetchContext, SourceAdapter, guarded, round1};

/// Category id in the lhr → metric name.
const CATEGORIES: &[(&str, &str)] = &[
    ("performance", "performance"),
    ("seo", "seo"),
    ("accessibility", "accessibility"),
    ("best-practices", "best_practices"),
];

/// Audit id in the lhr → metric name.
const AUDITS: &[(&str, &str)] = &[
    ("first-contentful-paint", "first_contentful_paint_ms"),
    ("largest-contentful-paint", "largest_contentful_paint_ms"),
    ("total-blocking-time", "total_blocking_time_ms"),
    ("speed-index", "speed_index_ms"),
    ("cumulative-layout-shift", "cumulative_layout_shift"),
];

#[derive(Debug, Deserialize)]
struct Build {
    id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Run {
    url: String,
    lhr: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Lhr {
    #[serde(default)]
    categories: std::collections::HashMap<String, Category>,
    #[serde(default)]
    audits: std::collections::HashMap<String, Audit>,
}

#[derive(Debug, Deserialize)]
struct Category {
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Audit {
    #[serde(rename = "numericValue")]
    numeric_value: Option<f64>,
}

pub struct LighthouseAdapter {
    http: reqwest::Client,
    config: LighthouseConfig,
}

impl LighthouseAdapter {
    #[must_use]
    pub const fn new(http: reqwest::Client, config: LighthouseConfig) -> Self {
        Self { http, config }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let url = join_url(&self.config.base_url, path);
        let mut request = self.http.get(&url);
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }
        let resp = check_response(request.send().await?).await?;
        Ok(serde_json::from_slice(&resp.bytes().await?)?)
    }

    async fn latest_run(&self, site: &Site) -> Result<SourceResult, AdapterError> {
        if !self.config.is_configured() {
            return Err(AdapterError::NotConfigured("lighthouse ci"));
        }
        let project = urlencoding::encode(&self.config.project_id);
        let builds: Vec<Build> = self
            .get_json(&format!("v1/projects/{project}/builds?limit=1"))
            .await?;
        let build = builds
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::EmptyResult("project has no builds".to_string()))?;

        let runs: Vec<Run> = self
            .get_json(&format!(
                "v1/projects/{project}/builds/{}/runs?representative=true",
                urlencoding::encode(&build.id)
            ))
            .await?;
        let run = runs
            .into_iter()
            .find(|r| same_page(&r.url, &site.url))
            .ok_or_else(|| {
                AdapterError::EmptyResult(format!("build {} has no run for {}", build.id, site.url))
            })?;

        let lhr = parse_lhr(run.lhr)?;
        Ok(normalize(&lhr))
    }
}

#[async_trait]
impl SourceAdapter for LighthouseAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Performance
    }

    async fn fetch(&self, site: &Site, ctx: &FetchContext) -> SourceResult {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        guarded(self.kind(), timeout, ctx, self.latest_run(site)).await
    }
}

/// Whether a run audited the site: same host and port, and the run path at
/// or below the site path. Scheme and trailing slash are ignored.
fn same_page(run_url: &str, site_url: &str) -> bool {
    let (Ok(run), Ok(site)) = (parse_site_url(run_url), parse_site_url(site_url)) else {
        return false;
    };
    if run.host_str() != site.host_str() || run.port() != site.port() {
        return false;
    }
    let site_path = site.path().trim_end_matches('/');
    let run_path = run.path().trim_end_matches('/');
    run_path == site_path
        || run_path
            .strip_prefix(site_path)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub(crate) fn parse_lhr(raw: serde_json::Value) -> Result<Lhr, AdapterError> {
    match raw {
        serde_json::Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

pub(crate) fn normalize(lhr: &Lhr) -> SourceResult {
    let mut payload = NormalizedPayload::default();
    let mut missing = Vec::new();

    for (id, metric) in CATEGORIES {
        match lhr.categories.get(*id).and_then(|c| c.score) {
            Some(score) => payload = payload.with_metric(metric, round1(score * 100.0)),
            None => missing.push(*id),
        }
    }
    for (id, metric) in AUDITS {
        if let Some(value) = lhr.audits.get(*id).and_then(|a| a.numeric_value) {
            let value = if metric.ends_with("_ms") {
                value.round()
            } else {
                (value * 1000.0).round() / 1000.0
            };
            payload = payload.with_metric(metric, value);
        }
    }
    payload.score = payload.metric("performance");

    if missing.is_empty() {
        payload.summary = Some(format!(
            "performance {}",
            payload.score.unwrap_or_default()
        ));
        SourceResult::success(SourceKind::Performance, payload)
    } else {
        let note = format!("missing categories: {}", missing.join(", "));
        payload.summary = Some(note.clone());
        SourceResult::partial(SourceKind::Performance, payload, note)
    }
}
