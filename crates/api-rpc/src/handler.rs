//! RPC Method Handlers
//!
//! Thin adapters from request types onto the Lifecycle Orchestrator.

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{
    CompletePaymentRequest, CompletePaymentResponse, CreateListingRequest, CreatedListing,
    DeleteListingResponse, GetListingRequest, ListListingsRequest, ListListingsResponse,
    ListingView, OwnedListingRequest, PricingTiersResponse, StatsResponse, UpdateListingRequest,
};
use jobboard_core::application::LifecycleOrchestrator;
use jobboard_core::port::TimerQueue;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    orchestrator: Arc<LifecycleOrchestrator>,
    timers: Arc<dyn TimerQueue>,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        orchestrator: Arc<LifecycleOrchestrator>,
        timers: Arc<dyn TimerQueue>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            orchestrator,
            timers,
            rate_limiter,
            start_time: Instant::now(),
        }
    }

    fn admit(&self, method: &str) -> Result<(), ErrorObjectOwned> {
        if self.rate_limiter.try_acquire() {
            Ok(())
        } else {
            debug!(method = method, "Request throttled");
            Err(throttled())
        }
    }

    /// listing.create.v1
    pub async fn create_listing(
        &self,
        req: CreateListingRequest,
    ) -> Result<CreatedListing, ErrorObjectOwned> {
        self.admit("listing.create.v1")?;
        self.orchestrator
            .create_listing(req)
            .await
            .map_err(to_rpc_error)
    }

    /// listing.update.v1
    pub async fn update_listing(
        &self,
        req: UpdateListingRequest,
    ) -> Result<ListingView, ErrorObjectOwned> {
        self.admit("listing.update.v1")?;
        let posting = self
            .orchestrator
            .update_content(&req.posting_id, &req.owner_id, req.content)
            .await
            .map_err(to_rpc_error)?;
        Ok(posting.into())
    }

    /// listing.get.v1
    pub async fn get_listing(&self, req: GetListingRequest) -> Result<ListingView, ErrorObjectOwned> {
        let posting = self
            .orchestrator
            .get_listing(&req.posting_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(posting.into())
    }

    /// listing.list.v1
    pub async fn list_listings(
        &self,
        req: ListListingsRequest,
    ) -> Result<ListListingsResponse, ErrorObjectOwned> {
        let postings = self
            .orchestrator
            .list_owner_listings(&req.owner_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(ListListingsResponse {
            listings: postings.into_iter().map(ListingView::from).collect(),
        })
    }

    /// listing.delete.v1
    pub async fn delete_listing(
        &self,
        req: OwnedListingRequest,
    ) -> Result<DeleteListingResponse, ErrorObjectOwned> {
        self.admit("listing.delete.v1")?;
        self.orchestrator
            .delete_listing(&req.posting_id, &req.owner_id)
            .await
            .map_err(to_rpc_error)?;
        Ok(DeleteListingResponse {
            posting_id: req.posting_id,
            deleted: true,
        })
    }

    /// listing.retry_payment.v1
    pub async fn retry_payment(
        &self,
        req: OwnedListingRequest,
    ) -> Result<CreatedListing, ErrorObjectOwned> {
        self.admit("listing.retry_payment.v1")?;
        self.orchestrator
            .retry_payment(&req.posting_id, &req.owner_id)
            .await
            .map_err(to_rpc_error)
    }

    /// payment.complete.v1
    pub async fn complete_payment(
        &self,
        req: CompletePaymentRequest,
    ) -> Result<CompletePaymentResponse, ErrorObjectOwned> {
        self.admit("payment.complete.v1")?;
        let transition = self
            .orchestrator
            .apply_payment_completion(&req.posting_id, req.outcome)
            .await
            .map_err(to_rpc_error)?;
        Ok(CompletePaymentResponse {
            posting_id: req.posting_id,
            transition,
        })
    }

    /// pricing.tiers.v1
    pub fn pricing_tiers(&self) -> PricingTiersResponse {
        PricingTiersResponse {
            tiers: self.orchestrator.pricing_tiers().to_vec(),
        }
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let counts = self
            .orchestrator
            .status_counts()
            .await
            .map_err(to_rpc_error)?;
        let pending_timers = self.timers.pending_count().await.map_err(to_rpc_error)?;

        Ok(StatsResponse::new(
            counts,
            pending_timers,
            self.start_time.elapsed().as_secs() as i64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use jobboard_core::domain::{PaymentOutcome, PostingContent, PostingStatus, PricingTable};
    use jobboard_core::port::expiration_scheduler::mocks::MockExpirationScheduler;
    use jobboard_core::port::id_provider::mocks::SequentialIdProvider;
    use jobboard_core::port::listing_store::mocks::InMemoryListingStore;
    use jobboard_core::port::payment_gateway::mocks::MockPaymentGateway;
    use jobboard_core::port::time_provider::mocks::MockTimeProvider;

    fn handler_with_limit(burst: u32) -> RpcHandler {
        let clock = Arc::new(MockTimeProvider::new(1_700_000_000_000));
        let scheduler = Arc::new(MockExpirationScheduler::new(clock.clone()));
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            Arc::new(InMemoryListingStore::new()),
            Arc::new(MockPaymentGateway::new()),
            scheduler.clone(),
            PricingTable::default(),
            Arc::new(SequentialIdProvider::new("posting")),
            clock,
        ));
        RpcHandler::new(orchestrator, scheduler, RateLimiter::new(burst, 0))
    }

    fn handler() -> RpcHandler {
        handler_with_limit(1_000)
    }

    fn create_request(owner: &str, days: u32) -> CreateListingRequest {
        CreateListingRequest {
            owner_id: owner.to_string(),
            content: PostingContent::new_test("Platform Engineer"),
            duration_days: days,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let handler = handler();
        let created = handler.create_listing(create_request("acme", 30)).await.unwrap();
        assert_eq!(created.status, PostingStatus::PendingPayment);

        let view = handler
            .get_listing(GetListingRequest {
                posting_id: created.posting_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(view.posting.owner_id, "acme");
        assert_eq!(view.expires_at, view.posting.expires_at());
    }

    #[tokio::test]
    async fn test_invalid_duration_is_validation_code() {
        let err = handler()
            .create_listing(create_request("acme", 14))
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_posting_is_not_found_code() {
        let err = handler()
            .get_listing(GetListingRequest {
                posting_id: "missing".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_foreign_owner_is_forbidden_code() {
        let handler = handler();
        let created = handler.create_listing(create_request("acme", 7)).await.unwrap();

        let err = handler
            .update_listing(UpdateListingRequest {
                posting_id: created.posting_id.clone(),
                owner_id: "intruder".to_string(),
                content: PostingContent::new_test("Hijacked"),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);

        let err = handler
            .delete_listing(OwnedListingRequest {
                posting_id: created.posting_id,
                owner_id: "intruder".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_complete_payment_and_retry_conflict() {
        let handler = handler();
        let created = handler.create_listing(create_request("acme", 30)).await.unwrap();

        let completed = handler
            .complete_payment(CompletePaymentRequest {
                posting_id: created.posting_id.clone(),
                outcome: PaymentOutcome::Success,
            })
            .await
            .unwrap();
        assert!(completed.transition.is_applied());

        let err = handler
            .retry_payment(OwnedListingRequest {
                posting_id: created.posting_id,
                owner_id: "acme".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_delete_and_stats() {
        let handler = handler();
        let first = handler.create_listing(create_request("acme", 7)).await.unwrap();
        handler.create_listing(create_request("acme", 60)).await.unwrap();
        handler.create_listing(create_request("other", 90)).await.unwrap();

        let listed = handler
            .list_listings(ListListingsRequest {
                owner_id: "acme".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(listed.listings.len(), 2);

        let deleted = handler
            .delete_listing(OwnedListingRequest {
                posting_id: first.posting_id,
                owner_id: "acme".to_string(),
            })
            .await
            .unwrap();
        assert!(deleted.deleted);

        let stats = handler.stats().await.unwrap();
        assert_eq!(stats.total_listings, 2);
        assert_eq!(stats.pending_payment, 2);
        // Deleting does not cancel the armed timer
        assert_eq!(stats.pending_timers, 3);
    }

    #[test]
    fn test_pricing_tiers_listed() {
        let tiers = handler().pricing_tiers().tiers;
        let days: Vec<u32> = tiers.iter().map(|t| t.days).collect();
        assert_eq!(days, vec![7, 30, 60, 90]);
    }

    #[tokio::test]
    async fn test_mutations_throttled_reads_not() {
        let handler = handler_with_limit(1);
        let created = handler.create_listing(create_request("acme", 7)).await.unwrap();

        let err = handler
            .create_listing(create_request("acme", 7))
            .await
            .unwrap_err();
        assert_eq!(err.code(), code::THROTTLED);

        assert!(handler
            .get_listing(GetListingRequest {
                posting_id: created.posting_id,
            })
            .await
            .is_ok());
    }
}
