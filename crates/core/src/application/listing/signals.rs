// Asynchronous lifecycle signals: payment completion and expiration
//
// Both handlers are idempotent and safe under at-least-once redelivery.
// Every status write is a compare-and-set, so a payment success can never
// overwrite EXPIRED.

use super::LifecycleOrchestrator;
use crate::domain::{DomainError, PaymentOutcome, PostingId, PostingStatus};
use crate::error::Result;
use serde::Serialize;
use tracing::{debug, info};

/// Statuses an expiration may move from
const EXPIRABLE_STATUSES: [PostingStatus; 2] = [PostingStatus::PendingPayment, PostingStatus::Active];

/// Effect of applying a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Status changed
    Applied {
        from: PostingStatus,
        to: PostingStatus,
    },
    /// Signal accepted, nothing to do
    Unchanged { current: PostingStatus },
    /// Posting no longer exists (expiration after delete)
    Missing,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

impl LifecycleOrchestrator {
    /// Apply a payment completion reported by the gateway
    ///
    /// | current          | success  | failure |
    /// |------------------|----------|---------|
    /// | PENDING_PAYMENT  | ACTIVE   | stays   |
    /// | ACTIVE / EXPIRED | no-op    | no-op   |
    ///
    /// A failure never expires the posting; the armed timer remains the only
    /// deadline.
    ///
    /// # Errors
    /// - `NotFound` for unknown postings (callers log and drop it)
    /// - infrastructure errors (callers let the gateway redeliver)
    pub async fn apply_payment_completion(
        &self,
        posting_id: &PostingId,
        outcome: PaymentOutcome,
    ) -> Result<TransitionOutcome> {
        let posting = self
            .store
            .get(posting_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(posting_id.clone()))?;

        if outcome == PaymentOutcome::Failure {
            info!(
                posting_id = %posting_id,
                status = %posting.status,
                "Payment failed; posting left as is until expiration"
            );
            return Ok(TransitionOutcome::Unchanged {
                current: posting.status,
            });
        }

        if posting.status != PostingStatus::PendingPayment {
            debug!(
                posting_id = %posting_id,
                status = %posting.status,
                "Payment success ignored"
            );
            return Ok(TransitionOutcome::Unchanged {
                current: posting.status,
            });
        }

        // Never activate a posting that has no deadline
        self.ensure_armed(&posting).await?;

        let now = self.time_provider.now_millis();
        let applied = self
            .store
            .conditional_update_status(
                posting_id,
                &[PostingStatus::PendingPayment],
                PostingStatus::Active,
                now,
            )
            .await?;

        if applied {
            info!(posting_id = %posting_id, "Posting activated");
            return Ok(TransitionOutcome::Applied {
                from: PostingStatus::PendingPayment,
                to: PostingStatus::Active,
            });
        }

        // Lost the race to an expiration or to a duplicate completion
        match self.store.get(posting_id).await? {
            Some(current) => {
                debug!(
                    posting_id = %posting_id,
                    status = %current.status,
                    "Payment success lost race, left unchanged"
                );
                Ok(TransitionOutcome::Unchanged {
                    current: current.status,
                })
            }
            None => Err(DomainError::NotFound(posting_id.clone()).into()),
        }
    }

    /// Apply the expiration signal for a posting
    ///
    /// Moves PENDING_PAYMENT or ACTIVE to EXPIRED regardless of payment
    /// state. Already EXPIRED is a no-op; an unknown posting is a no-op
    /// (`Missing`), not an error. `from` is the status read before the write.
    pub async fn apply_expiration(&self, posting_id: &PostingId) -> Result<TransitionOutcome> {
        let Some(posting) = self.store.get(posting_id).await? else {
            info!(posting_id = %posting_id, "Expiration for deleted posting dropped");
            return Ok(TransitionOutcome::Missing);
        };

        if !posting.status.can_transition_to(PostingStatus::Expired) {
            debug!(posting_id = %posting_id, "Posting already expired");
            return Ok(TransitionOutcome::Unchanged {
                current: posting.status,
            });
        }

        // One guarded write covers a concurrent PENDING_PAYMENT -> ACTIVE
        let now = self.time_provider.now_millis();
        let applied = self
            .store
            .conditional_update_status(posting_id, &EXPIRABLE_STATUSES, PostingStatus::Expired, now)
            .await?;

        if !applied {
            // Deleted or expired by another delivery since the read
            return match self.store.get(posting_id).await? {
                Some(current) => Ok(TransitionOutcome::Unchanged {
                    current: current.status,
                }),
                None => Ok(TransitionOutcome::Missing),
            };
        }

        info!(posting_id = %posting_id, from = %posting.status, "Posting expired");
        Ok(TransitionOutcome::Applied {
            from: posting.status,
            to: PostingStatus::Expired,
        })
    }
}
