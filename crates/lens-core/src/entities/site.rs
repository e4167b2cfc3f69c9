use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::enums::SiteTier;
use crate::errors::CoreError;

/// A tenant's tracked website.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Site {
    pub id: String,
    pub tenant_id: String,
    pub url: String,
    pub name: Option<String>,
    pub tier: SiteTier,
    pub active: bool,
    #[serde(default)]
    pub scores: SiteScores,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Scores cached from the most recent report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SiteScores {
    pub last_audit_at: Option<DateTime<Utc>>,
    pub last_audit_score: Option<f64>,
    pub performance_score: Option<f64>,
    pub seo_score: Option<f64>,
    pub accessibility_score: Option<f64>,
    pub best_practices_score: Option<f64>,
}

impl Site {
    /// Host portion of the site URL (`https://www.example.com/x` → `www.example.com`).
    #[must_use]
    pub fn host(&self) -> Option<String> {
        parse_site_url(&self.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// Parse an absolute http(s) URL that names a host.
///
/// # Errors
///
/// Returns `CoreError::Validation` describing the problem.
pub fn parse_site_url(url: &str) -> Result<Url, CoreError> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| CoreError::Validation(format!("invalid site url '{trimmed}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CoreError::Validation(format!(
            "site url must use http or https: '{trimmed}'"
        )));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(CoreError::Validation(format!("site url has no host: '{trimmed}'"))),
    }
}

/// Check that `url` is an absolute http(s) URL with a host.
///
/// # Errors
///
/// Returns `CoreError::Validation` describing the problem.
pub fn validate_site_url(url: &str) -> Result<(), CoreError> {
    parse_site_url(url).map(|_| ())
}
