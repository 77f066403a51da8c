// Sweeper constants (no magic values)
use std::time::Duration;

/// How often due timers are polled
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Sleep after a failed poll before trying again
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Timers claimed per poll
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// How long a claimed timer stays invisible to other sweepers (1 minute)
pub const DEFAULT_LEASE_MS: i64 = 60 * 1000;

/// First redelivery delay after a failed expiration (1s)
pub const DEFAULT_REDELIVERY_BASE_DELAY_MS: i64 = 1000;

/// Redelivery backoff multiplier
pub const DEFAULT_REDELIVERY_BACKOFF_FACTOR: f64 = 2.0;

/// Redelivery delay ceiling (5 minutes)
pub const DEFAULT_REDELIVERY_MAX_DELAY_MS: i64 = 5 * 60 * 1000;
