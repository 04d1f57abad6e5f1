//! Pure delay policies for enrichment batches.
//!
//! [`PacingPolicy`] spaces tracks inside a batch and backs off while the
//! external source keeps failing. [`RetryPolicy`] spaces whole-batch
//! retries after a transient abort. Neither sleeps; callers do.

use std::time::Duration;

use crate::config::EnrichmentConfig;

/// Inter-track delay that doubles for every failure in excess of successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl PacingPolicy {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_delay_ms),
            max: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before the next track, given the batch's running tallies.
    pub fn delay(&self, failures: u32, successes: u32) -> Duration {
        exponential(self.base, failures.saturating_sub(successes), self.max)
    }
}

/// Bounded exponential backoff between whole-batch retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first run
    pub max_retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            max_retries: config.batch_retries,
            base: Duration::from_millis(config.retry_base_delay_ms),
            max: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        exponential(self.base, retry, self.max)
    }
}

/// `base * 2^exponent`, capped at `max` without overflowing.
fn exponential(base: Duration, exponent: u32, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The pacing delay never leaves [base, max]
        #[test]
        fn pacing_bounded(failures in any::<u32>(), successes in any::<u32>()) {
            let policy = PacingPolicy { base: Duration::from_millis(500), max: Duration::from_secs(30) };
            let delay = policy.delay(failures, successes);
            prop_assert!(delay >= policy.base && delay <= policy.max);
        }

        /// More failures never shorten the delay
        #[test]
        fn pacing_monotonic(failures in 0u32..64, successes in 0u32..64) {
            let policy = PacingPolicy { base: Duration::from_millis(500), max: Duration::from_secs(30) };
            prop_assert!(policy.delay(failures + 1, successes) >= policy.delay(failures, successes));
        }
    }
}
