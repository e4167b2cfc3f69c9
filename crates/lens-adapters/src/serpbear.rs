//! `SerpBear` rank tracking client.
//!
//! `GET {base}/api/keywords?domain={host}` returns every keyword tracked for
//! the domain with its latest position. Position `0` or `null` means the
//! keyword does not rank.

use std::time::Duration;

use async_trait::async_trait;
use lens_config::SerpBearConfig;
use lens_core::entities::{NormalizedPayload, PayloadItem, Site, SourceResult};
use lens_core::enums::SourceKind;
use serde::Deserialize;

use crate::error::AdapterError;
use crate::http::{check_response, join_url};
use crate::{FetchContext, SourceAdapter, count, guarded, percent, round1};

#[derive(Debug, Deserialize)]
pub(crate) struct KeywordsResponse {
    #[serde(default)]
    keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize)]
struct Keyword {
    keyword: String,
    #[serde(default)]
    position: Option<f64>,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl Keyword {
    fn rank(&self) -> Option<f64> {
        self.position.filter(|p| *p >= 1.0)
    }
}

pub struct SerpBearAdapter {
    http: reqwest::Client,
    config: SerpBearConfig,
}

impl SerpBearAdapter {
    #[must_use]
    pub const fn new(http: reqwest::Client, config: SerpBearConfig) -> Self {
        Self { http, config }
    }

    async fn keywords(&self, site: &Site, ctx: &FetchContext) -> Result<SourceResult, AdapterError> {
        if !self.config.is_configured() {
            return Err(AdapterError::NotConfigured("serpbear"));
        }
        let host = site
            .host()
            .ok_or_else(|| AdapterError::Parse(format!("site url has no host: {}", site.url)))?;
        let url = format!(
            "{}?domain={}",
            join_url(&self.config.base_url, "api/keywords"),
            urlencoding::encode(&host)
        );
        let resp = check_response(
            self.http
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await?,
        )
        .await?;
        let body: KeywordsResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(normalize(body, ctx.max_keywords))
    }
}

#[async_trait]
impl SourceAdapter for SerpBearAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Ranking
    }

    async fn fetch(&self, site: &Site, ctx: &FetchContext) -> SourceResult {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        guarded(self.kind(), timeout, ctx, self.keywords(site, ctx)).await
    }
}

/// Normalize a keyword snapshot, keeping at most `max_keywords` entries.
pub(crate) fn normalize(mut body: KeywordsResponse, max_keywords: Option<usize>) -> SourceResult {
    if let Some(limit) = max_keywords {
        body.keywords.truncate(limit);
    }
    let keywords = body.keywords;
    let tracked = keywords.len();
    let ranks: Vec<f64> = keywords.iter().filter_map(Keyword::rank).collect();
    let top3 = ranks.iter().filter(|p| **p <= 3.0).count();
    let top10 = ranks.iter().filter(|p| **p <= 10.0).count();

    let mut payload = NormalizedPayload {
        score: percent(top10, tracked),
        summary: Some(format!(
            "{top10} of {tracked} tracked keywords rank in the top 10"
        )),
        ..Default::default()
    }
    .with_metric("keywords_tracked", count(tracked))
    .with_metric("ranked", count(ranks.len()))
    .with_metric("top3", count(top3))
    .with_metric("top10", count(top10));

    if !ranks.is_empty() {
        let avg = ranks.iter().sum::<f64>() / count(ranks.len());
        payload = payload.with_metric("avg_position", round1(avg));
    }

    payload.items = keywords
        .iter()
        .map(|k| PayloadItem {
            label: k.keyword.clone(),
            value: k.rank(),
            detail: Some(format!(
                "{}/{}",
                k.device.as_deref().unwrap_or("desktop"),
                k.country.as_deref().unwrap_or("US")
            )),
        })
        .collect();

    if tracked == 0 {
        SourceResult::partial(SourceKind::Ranking, payload, "no keywords tracked for domain")
    } else {
        SourceResult::success(SourceKind::Ranking, payload)
    }
}
