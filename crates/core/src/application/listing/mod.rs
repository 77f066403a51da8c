// Listing Lifecycle - the only component that mutates posting state
//
// Inputs: owner requests (create / edit / delete / retry payment),
// payment completion signals, expiration signals.

pub mod create;
pub mod signals;

#[cfg(test)]
mod orchestrator_test;

pub use create::{CreateListingRequest, CreatedListing};
pub use signals::TransitionOutcome;

use crate::domain::{
    DomainError, JobPosting, PostingContent, PostingId, PostingStatus, PricingTable, PricingTier,
};
use crate::error::Result;
use crate::port::{ExpirationScheduler, IdProvider, ListingStore, PaymentGateway, TimeProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Statuses in which content edits are accepted
const EDITABLE_STATUSES: [PostingStatus; 2] = [PostingStatus::PendingPayment, PostingStatus::Active];

/// Posting count per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending_payment: i64,
    pub active: i64,
    pub expired: i64,
}

/// Lifecycle Orchestrator
///
/// Collaborators are injected; nothing here holds state between calls, so any
/// number of processes may run one against the same store.
pub struct LifecycleOrchestrator {
    store: Arc<dyn ListingStore>,
    gateway: Arc<dyn PaymentGateway>,
    scheduler: Arc<dyn ExpirationScheduler>,
    pricing: PricingTable,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl LifecycleOrchestrator {
    pub fn new(
        store: Arc<dyn ListingStore>,
        gateway: Arc<dyn PaymentGateway>,
        scheduler: Arc<dyn ExpirationScheduler>,
        pricing: PricingTable,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            gateway,
            scheduler,
            pricing,
            id_provider,
            time_provider,
        }
    }

    pub fn pricing_tiers(&self) -> &[PricingTier] {
        self.pricing.tiers()
    }

    /// Fetch a posting or fail with `NotFound`
    pub async fn get_listing(&self, posting_id: &PostingId) -> Result<JobPosting> {
        self.store
            .get(posting_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(posting_id.clone()).into())
    }

    /// All postings of an owner, newest first
    pub async fn list_owner_listings(&self, owner_id: &str) -> Result<Vec<JobPosting>> {
        self.store.find_by_owner(owner_id).await
    }

    /// Overwrite content fields of a non-expired posting
    ///
    /// Status, timestamps and duration are untouched; expiration is not re-armed.
    ///
    /// # Errors
    /// - `Validation` if the new content is malformed
    /// - `NotFound` / `Forbidden` / `Terminal`
    pub async fn update_content(
        &self,
        posting_id: &PostingId,
        owner_id: &str,
        content: PostingContent,
    ) -> Result<JobPosting> {
        content.validate()?;

        let posting = self.get_listing(posting_id).await?;
        posting.ensure_owned_by(owner_id)?;
        if !posting.status.is_editable() {
            return Err(DomainError::Terminal(posting_id.clone()).into());
        }

        let now = self.time_provider.now_millis();
        let applied = self
            .store
            .update_content(posting_id, &EDITABLE_STATUSES, &content, now)
            .await?;

        if !applied {
            // Expired (or deleted) between the read and the guarded write
            return match self.store.get(posting_id).await? {
                None => Err(DomainError::NotFound(posting_id.clone()).into()),
                Some(_) => Err(DomainError::Terminal(posting_id.clone()).into()),
            };
        }

        info!(posting_id = %posting_id, owner_id = %owner_id, "Posting content updated");
        self.get_listing(posting_id).await
    }

    /// Owner-initiated removal
    ///
    /// The armed expiration timer is left in place; when it fires it finds no
    /// record and is dropped.
    pub async fn delete_listing(&self, posting_id: &PostingId, owner_id: &str) -> Result<()> {
        let posting = self.get_listing(posting_id).await?;
        posting.ensure_owned_by(owner_id)?;

        if !self.store.delete(posting_id).await? {
            return Err(DomainError::NotFound(posting_id.clone()).into());
        }

        info!(
            posting_id = %posting_id,
            owner_id = %owner_id,
            status = %posting.status,
            "Posting deleted"
        );
        Ok(())
    }

    pub async fn status_counts(&self) -> Result<StatusCounts> {
        Ok(StatusCounts {
            pending_payment: self
                .store
                .count_by_status(PostingStatus::PendingPayment)
                .await?,
            active: self.store.count_by_status(PostingStatus::Active).await?,
            expired: self.store.count_by_status(PostingStatus::Expired).await?,
        })
    }
}
