// Startup recovery: re-arm expirations lost between insert and arm
use crate::domain::{JobPosting, PostingStatus};
use crate::error::Result;
use crate::port::{ExpirationScheduler, ListingStore, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Recovery service
///
/// A process crash after a posting is stored but before its timer is armed
/// would leave a posting that never expires. Running this on startup closes
/// that gap; it is safe to run any number of times.
pub struct RecoveryService {
    store: Arc<dyn ListingStore>,
    scheduler: Arc<dyn ExpirationScheduler>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        scheduler: Arc<dyn ExpirationScheduler>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            scheduler,
            time_provider,
        }
    }

    /// Arm a timer for every non-expired posting that has none
    ///
    /// The timer fires at `created_at + duration`; postings already past their
    /// deadline get a zero delay and expire on the next sweep.
    ///
    /// # Returns
    /// Number of timers armed
    pub async fn rearm_missing_timers(&self) -> Result<usize> {
        info!("Starting expiration timer recovery");
        let mut rearmed = 0;

        for status in [PostingStatus::PendingPayment, PostingStatus::Active] {
            for posting in self.store.find_by_status(status).await? {
                if self.scheduler.is_armed(&posting.id).await? {
                    continue;
                }
                if self.rearm(&posting).await? {
                    rearmed += 1;
                }
            }
        }

        info!(rearmed_count = rearmed, "Expiration timer recovery complete");
        Ok(rearmed)
    }

    async fn rearm(&self, posting: &JobPosting) -> Result<bool> {
        let delay_ms = (posting.expires_at() - self.time_provider.now_millis()).max(0);
        let armed = self.scheduler.arm_after(&posting.id, delay_ms).await?;

        if armed {
            warn!(
                posting_id = %posting.id,
                status = %posting.status,
                delay_ms = delay_ms,
                "Re-armed missing expiration timer"
            );
        }
        Ok(armed)
    }
}
