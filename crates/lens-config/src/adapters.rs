//! Upstream service configuration: technical crawler, SerpBear, Lighthouse CI, LLM.
//!
//! Every section has a `base_url` and a `timeout_secs` bounding a whole fetch.
//! A section with an empty `base_url` is unconfigured; its adapter reports
//! `not_configured` instead of calling out.

use serde::{Deserialize, Serialize};

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_llm_timeout_secs() -> u64 {
    60
}

const fn default_max_pages() -> u32 {
    50
}

const fn default_max_tokens() -> u32 {
    1024
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

/// Technical crawl service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TechnicalConfig {
    #[serde(default)]
    pub base_url: String,

    /// Bearer token for the crawl service, if it requires one.
    #[serde(default)]
    pub api_key: String,

    /// Page budget passed to each crawl.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TechnicalConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }
}

/// SerpBear rank tracker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerpBearConfig {
    /// Instance URL (e.g., `https://serpbear.example.com`).
    #[serde(default)]
    pub base_url: String,

    /// API key from the SerpBear settings page.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SerpBearConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SerpBearConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

/// Lighthouse CI server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LighthouseConfig {
    #[serde(default)]
    pub base_url: String,

    /// LHCI project id whose builds hold the site's runs.
    #[serde(default)]
    pub project_id: String,

    /// Basic-auth or bearer token for a protected LHCI server.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            project_id: String::new(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LighthouseConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.project_id.is_empty()
    }
}

/// LLM content analysis API (Anthropic Messages API shape).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}
