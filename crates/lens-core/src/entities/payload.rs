use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Common schema every adapter maps its raw upstream payload into.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NormalizedPayload {
    /// Headline score on a 0–100 scale, when the source has one.
    pub score: Option<f64>,
    /// Named numeric metrics (e.g. `avg_position`, `largest_contentful_paint_ms`).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Itemized entries (keyword positions, failed checks, recommendations).
    #[serde(default)]
    pub items: Vec<PayloadItem>,
    /// Free-text summary.
    pub summary: Option<String>,
}

/// One itemized entry of a normalized payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PayloadItem {
    pub label: String,
    pub value: Option<f64>,
    pub detail: Option<String>,
}

impl NormalizedPayload {
    /// Set a metric, returning `self` for chaining.
    #[must_use]
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

impl PayloadItem {
    #[must_use]
    pub fn new(label: impl Into<String>, value: Option<f64>, detail: Option<String>) -> Self {
        Self {
            label: label.into(),
            value,
            detail,
        }
    }
}
