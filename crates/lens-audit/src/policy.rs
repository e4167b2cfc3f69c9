//! Retry and deadline policy for one aggregation.

use std::time::Duration;

use lens_config::AggregatorConfig;

/// How a failed source call is retried and how long an aggregation may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationPolicy {
    /// Attempts per source, including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Global bound on one aggregation.
    pub deadline: Duration,
}

impl AggregationPolicy {
    /// Delay after `attempt` (1-based) failed: `base × 2^(attempt-1)`, capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl From<&AggregatorConfig> for AggregationPolicy {
    fn from(config: &AggregatorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            deadline: Duration::from_secs(config.deadline_secs),
        }
    }
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::from(&AggregatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 500)]
    #[case(2, 1000)]
    #[case(3, 2000)]
    #[case(4, 4000)]
    #[case(5, 5000)]
    #[case(30, 5000)]
    fn backoff_doubles_then_caps(#[case] attempt: u32, #[case] expected_ms: u64) {
        let policy = AggregationPolicy::default();
        assert_eq!(policy.backoff(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn defaults_follow_config() {
        let policy = AggregationPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.deadline, Duration::from_secs(120));
    }
}
