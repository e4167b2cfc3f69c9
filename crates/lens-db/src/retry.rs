//! Transient error retry logic for remote libSQL databases.
//!
//! Remote (Turso/Hrana) databases occasionally answer with errors caused by
//! node recycling or lock contention during provisioning. These resolve on
//! their own within seconds, so queries against a remote database are retried
//! with capped exponential backoff.
//!
//! Local databases never encounter these errors; the retry path is gated on
//! `LensDb::is_remote`.

use std::time::Duration;

/// Configuration for retry behavior on transient remote errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after `attempt` (1-based) failed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect transient remote infrastructure errors.
///
/// The predicate is intentionally narrow to avoid retrying genuine
/// SQL or constraint errors.
pub fn is_transient_error(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("unable to acquire shared lock")
        || msg.contains("deletion must be in progress")
        || msg.contains("stream expired")
}
