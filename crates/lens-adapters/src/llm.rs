//! LLM content analysis client (Anthropic Messages API shape).
//!
//! The model is asked for a `SCORE: n` line followed by `- ` bullet
//! recommendations. Anything else in the reply becomes the summary.

use std::time::Duration;

use async_trait::async_trait;
use lens_config::LlmConfig;
use lens_core::entities::{NormalizedPayload, PayloadItem, Site, SourceResult};
use lens_core::enums::SourceKind;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::{check_response, join_url};
use crate::{FetchContext, SourceAdapter, count, guarded};

const API_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You are an SEO content analyst. Assess the content quality, \
search intent coverage and on-page SEO of the given website. Answer with one line \
`SCORE: <0-100>`, one short paragraph of assessment, then concrete recommendations, \
one per line, each starting with `- `.";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

pub struct LlmAdapter {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmAdapter {
    #[must_use]
    pub const fn new(http: reqwest::Client, config: LlmConfig) -> Self {
        Self { http, config }
    }

    async fn analyze(&self, site: &Site) -> Result<SourceResult, AdapterError> {
        if !self.config.is_configured() {
            return Err(AdapterError::NotConfigured("llm"));
        }
        let prompt = match &site.name {
            Some(name) => format!("Website: {} ({name})", site.url),
            None => format!("Website: {}", site.url),
        };
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };
        let resp = check_response(
            self.http
                .post(join_url(&self.config.base_url, "v1/messages"))
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&body)
                .send()
                .await?,
        )
        .await?;
        let reply: MessagesResponse = serde_json::from_slice(&resp.bytes().await?)?;
        normalize(&reply)
    }
}

#[async_trait]
impl SourceAdapter for LlmAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::AiInsight
    }

    async fn fetch(&self, site: &Site, ctx: &FetchContext) -> SourceResult {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        guarded(self.kind(), timeout, ctx, self.analyze(site)).await
    }
}

pub(crate) fn normalize(reply: &MessagesResponse) -> Result<SourceResult, AdapterError> {
    let text: String = reply
        .content
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    if text.trim().is_empty() {
        return Err(AdapterError::EmptyResult("model returned no text".to_string()));
    }

    let mut score = None;
    let mut items = Vec::new();
    let mut summary = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(value) = line.strip_prefix("SCORE:") {
            score = score.or_else(|| value.trim().parse::<f64>().ok().map(|v| v.clamp(0.0, 100.0)));
        } else if let Some(bullet) = line.strip_prefix("- ") {
            items.push(PayloadItem::new(bullet.trim(), None, None));
        } else {
            summary.push(line);
        }
    }

    let recommendations = count(items.len());
    let payload = NormalizedPayload {
        score,
        items,
        summary: (!summary.is_empty()).then(|| summary.join(" ")),
        ..Default::default()
    }
    .with_metric("recommendations", recommendations);

    if reply.stop_reason.as_deref() == Some("max_tokens") {
        Ok(SourceResult::partial(
            SourceKind::AiInsight,
            payload,
            "response truncated at max_tokens",
        ))
    } else {
        Ok(SourceResult::success(SourceKind::AiInsight, payload))
    }
}
