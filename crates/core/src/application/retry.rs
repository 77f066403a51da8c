// Redelivery backoff for expiration signals
use crate::application::sweeper::constants::{
    DEFAULT_REDELIVERY_BACKOFF_FACTOR, DEFAULT_REDELIVERY_BASE_DELAY_MS,
    DEFAULT_REDELIVERY_MAX_DELAY_MS,
};
use tracing::debug;

/// Backoff policy for failed expiration deliveries
///
/// Expirations are never dropped, so there is no attempt limit; the delay
/// grows exponentially up to `max_delay_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    base_delay_ms: i64,
    backoff_factor: f64,
    max_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay after the first failure
    /// * `backoff_factor` - Multiplier per further failure
    /// * `max_delay_ms` - Upper bound on any single delay
    pub fn new(base_delay_ms: i64, backoff_factor: f64, max_delay_ms: i64) -> Self {
        Self {
            base_delay_ms: base_delay_ms.max(1),
            backoff_factor: backoff_factor.max(1.0),
            max_delay_ms: max_delay_ms.max(base_delay_ms.max(1)),
        }
    }

    /// Delay before the next delivery of `key` after `attempts` failures
    ///
    /// delay = min(base * factor^attempts, max) * jitter, jitter in [0.9, 1.1]
    /// seeded by `key` so concurrent failures spread out deterministically.
    pub fn delay_for(&self, key: &str, attempts: i32) -> i64 {
        let exponent = attempts.clamp(0, 32);
        let raw = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);

        let jitter_seed = key.chars().map(|c| c as u32).fold(0u32, u32::wrapping_add);
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0);

        let delay_ms = (capped * jitter_factor) as i64;
        debug!(key = %key, attempts = attempts, delay_ms = delay_ms, "Computed redelivery delay");
        delay_ms
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_REDELIVERY_BASE_DELAY_MS,
            DEFAULT_REDELIVERY_BACKOFF_FACTOR,
            DEFAULT_REDELIVERY_MAX_DELAY_MS,
        )
    }
}
