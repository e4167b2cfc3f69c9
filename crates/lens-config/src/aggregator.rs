//! Aggregation policy: retries, backoff, deadline, and contention handling.

use serde::{Deserialize, Serialize};

const fn default_max_attempts() -> u32 {
    2
}

const fn default_base_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

const fn default_deadline_secs() -> u64 {
    120
}

/// What to do with a new request while another one for the same site is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentionPolicy {
    /// Wait for the site lock.
    #[default]
    Queue,
    /// Fail fast with `ConcurrentAuditInProgress`.
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Attempts per source, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles per attempt.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Cap on the retry delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Global bound on one aggregation, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    #[serde(default)]
    pub contention: ContentionPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            deadline_secs: default_deadline_secs(),
            contention: ContentionPolicy::default(),
        }
    }
}
