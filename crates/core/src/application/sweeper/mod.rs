// Expiration Sweeper - delivers due expiration timers to the orchestrator

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::listing::LifecycleOrchestrator;
use crate::application::retry::RetryPolicy;
use crate::error::Result;
use crate::port::{DueTimer, TimeProvider, TimerQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Sweeper tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub lease_ms: i64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            lease_ms: DEFAULT_LEASE_MS,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Timers acknowledged as fired
    pub delivered: usize,
    /// Timers released for a later redelivery
    pub retried: usize,
}

/// Polls the timer queue and applies expirations
///
/// Delivery is at-least-once: a timer is acknowledged only after the
/// orchestrator accepted it. Failures and panics release the timer with
/// backoff; a crashed sweeper's leases simply run out.
pub struct ExpirationSweeper {
    orchestrator: Arc<LifecycleOrchestrator>,
    timers: Arc<dyn TimerQueue>,
    retry_policy: RetryPolicy,
    time_provider: Arc<dyn TimeProvider>,
    config: SweeperConfig,
}

impl ExpirationSweeper {
    pub fn new(
        orchestrator: Arc<LifecycleOrchestrator>,
        timers: Arc<dyn TimerQueue>,
        retry_policy: RetryPolicy,
        time_provider: Arc<dyn TimeProvider>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            orchestrator,
            timers,
            retry_policy,
            time_provider,
            config,
        }
    }

    /// Run the sweep loop until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Expiration sweeper started"
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            let pause = match self.sweep_once().await {
                // A full batch suggests more are due
                Ok(report)
                    if report.delivered > 0
                        && report.delivered + report.retried >= self.config.batch_size =>
                {
                    continue;
                }
                Ok(_) => self.config.poll_interval,
                Err(e) => {
                    error!(error = %e, "Expiration sweep failed");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };

            tokio::select! {
                _ = sleep(pause) => {},
                _ = shutdown.wait() => break,
            }
        }

        info!("Expiration sweeper stopped");
        Ok(())
    }

    /// Claim due timers once and deliver them
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.time_provider.now_millis();
        let due = self
            .timers
            .claim_due(now, self.config.batch_size, self.config.lease_ms)
            .await?;

        if due.is_empty() {
            return Ok(SweepReport::default());
        }
        debug!(count = due.len(), "Claimed due expiration timers");

        // Each delivery runs in its own task so a panic cannot take the sweeper down
        let deliveries: Vec<_> = due
            .into_iter()
            .map(|timer| {
                let orchestrator = Arc::clone(&self.orchestrator);
                let posting_id = timer.posting_id.clone();
                let handle =
                    tokio::spawn(async move { orchestrator.apply_expiration(&posting_id).await });
                (timer, handle)
            })
            .collect();

        let mut report = SweepReport::default();
        for (timer, handle) in deliveries {
            match handle.await {
                Ok(Ok(outcome)) => {
                    debug!(posting_id = %timer.posting_id, outcome = ?outcome, "Expiration delivered");
                    self.acknowledge(&timer).await;
                    report.delivered += 1;
                }
                Ok(Err(e)) => {
                    warn!(
                        posting_id = %timer.posting_id,
                        attempts = timer.attempts,
                        error = %e,
                        "Expiration delivery failed, scheduling redelivery"
                    );
                    self.release(&timer, &e.to_string()).await;
                    report.retried += 1;
                }
                Err(join_err) => {
                    error!(
                        posting_id = %timer.posting_id,
                        error = ?join_err,
                        "Expiration delivery panicked, scheduling redelivery"
                    );
                    self.release(&timer, "delivery panicked").await;
                    report.retried += 1;
                }
            }
        }

        Ok(report)
    }

    async fn acknowledge(&self, timer: &DueTimer) {
        let now = self.time_provider.now_millis();
        if let Err(e) = self.timers.mark_fired(&timer.posting_id, now).await {
            // Lease runs out and the signal is redelivered; handling is idempotent
            warn!(posting_id = %timer.posting_id, error = %e, "Failed to acknowledge timer");
        }
    }

    async fn release(&self, timer: &DueTimer, reason: &str) {
        let delay_ms = self.retry_policy.delay_for(&timer.posting_id, timer.attempts);
        let retry_at = self.time_provider.now_millis() + delay_ms;

        if let Err(e) = self.timers.release(&timer.posting_id, retry_at, reason).await {
            warn!(posting_id = %timer.posting_id, error = %e, "Failed to release timer");
        }
    }
}
