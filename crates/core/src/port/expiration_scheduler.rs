// Expiration Scheduler Port
// Durable delayed delivery of "expire now" signals, keyed by posting ID

use crate::domain::PostingId;
use crate::error::Result;
use async_trait::async_trait;

/// Arms delayed expiration signals.
///
/// Implementations must persist armed timers so they survive restarts, and
/// deliver each at least once (see `TimerQueue`).
#[async_trait]
pub trait ExpirationScheduler: Send + Sync {
    /// Arm a signal for `posting_id` firing no earlier than `delay_ms` from now
    ///
    /// At most one timer exists per posting: arming again is a no-op.
    /// Returns `true` if a new timer was armed.
    async fn arm_after(&self, posting_id: &PostingId, delay_ms: i64) -> Result<bool>;

    /// Whether a timer (fired or not) exists for `posting_id`
    async fn is_armed(&self, posting_id: &PostingId) -> Result<bool>;
}

/// A timer claimed for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTimer {
    pub posting_id: PostingId,
    pub due_at: i64,
    /// Failed deliveries so far
    pub attempts: i32,
}

/// Delivery side of the scheduler, driven by the ExpirationSweeper
#[async_trait]
pub trait TimerQueue: Send + Sync {
    /// Lease up to `limit` unfired timers with `due_at <= now`
    ///
    /// A leased timer is invisible to other claimers until `now + lease_ms`,
    /// after which it is claimable again (crash redelivery).
    async fn claim_due(&self, now_millis: i64, limit: usize, lease_ms: i64)
        -> Result<Vec<DueTimer>>;

    /// Acknowledge delivery
    async fn mark_fired(&self, posting_id: &PostingId, now_millis: i64) -> Result<()>;

    /// Give a claimed timer back after a failed delivery
    async fn release(&self, posting_id: &PostingId, retry_at: i64, error: &str) -> Result<()>;

    /// Timers not yet fired
    async fn pending_count(&self) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub struct MockTimer {
        pub due_at: i64,
        pub attempts: i32,
        pub lease_until: Option<i64>,
        pub fired_at: Option<i64>,
        pub last_error: Option<String>,
    }

    /// In-memory scheduler + timer queue
    pub struct MockExpirationScheduler {
        time_provider: Arc<dyn TimeProvider>,
        timers: Mutex<BTreeMap<PostingId, MockTimer>>,
        arm_calls: Mutex<Vec<(PostingId, i64)>>,
        fail: AtomicBool,
    }

    impl MockExpirationScheduler {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                time_provider,
                timers: Mutex::new(BTreeMap::new()),
                arm_calls: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }

        /// Make arming fail with a Scheduler error
        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        /// Every `arm_after` call as `(posting_id, delay_ms)`
        pub fn arm_calls(&self) -> Vec<(PostingId, i64)> {
            self.arm_calls.lock().unwrap().clone()
        }

        pub fn timer(&self, posting_id: &str) -> Option<MockTimer> {
            self.timers.lock().unwrap().get(posting_id).cloned()
        }

        pub fn timer_count(&self) -> usize {
            self.timers.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ExpirationScheduler for MockExpirationScheduler {
        async fn arm_after(&self, posting_id: &PostingId, delay_ms: i64) -> Result<bool> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Scheduler("mock scheduler unavailable".to_string()));
            }
            self.arm_calls
                .lock()
                .unwrap()
                .push((posting_id.clone(), delay_ms));

            let mut timers = self.timers.lock().unwrap();
            if timers.contains_key(posting_id) {
                return Ok(false);
            }
            timers.insert(
                posting_id.clone(),
                MockTimer {
                    due_at: self.time_provider.now_millis() + delay_ms.max(0),
                    attempts: 0,
                    lease_until: None,
                    fired_at: None,
                    last_error: None,
                },
            );
            Ok(true)
        }

        async fn is_armed(&self, posting_id: &PostingId) -> Result<bool> {
            Ok(self.timers.lock().unwrap().contains_key(posting_id))
        }
    }

    #[async_trait]
    impl TimerQueue for MockExpirationScheduler {
        async fn claim_due(
            &self,
            now_millis: i64,
            limit: usize,
            lease_ms: i64,
        ) -> Result<Vec<DueTimer>> {
            let mut timers = self.timers.lock().unwrap();
            let mut claimed = Vec::new();

            for (posting_id, timer) in timers.iter_mut() {
                if claimed.len() >= limit {
                    break;
                }
                let leased = timer.lease_until.is_some_and(|until| until > now_millis);
                if timer.fired_at.is_none() && timer.due_at <= now_millis && !leased {
                    timer.lease_until = Some(now_millis + lease_ms);
                    claimed.push(DueTimer {
                        posting_id: posting_id.clone(),
                        due_at: timer.due_at,
                        attempts: timer.attempts,
                    });
                }
            }
            Ok(claimed)
        }

        async fn mark_fired(&self, posting_id: &PostingId, now_millis: i64) -> Result<()> {
            if let Some(timer) = self.timers.lock().unwrap().get_mut(posting_id) {
                timer.fired_at = Some(now_millis);
                timer.lease_until = None;
            }
            Ok(())
        }

        async fn release(&self, posting_id: &PostingId, retry_at: i64, error: &str) -> Result<()> {
            if let Some(timer) = self.timers.lock().unwrap().get_mut(posting_id) {
                timer.attempts += 1;
                timer.due_at = retry_at;
                timer.lease_until = None;
                timer.last_error = Some(error.to_string());
            }
            Ok(())
        }

        async fn pending_count(&self) -> Result<i64> {
            Ok(self
                .timers
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.fired_at.is_none())
                .count() as i64)
        }
    }
}
