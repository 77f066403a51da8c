//! RPC Request/Response Types
//!
//! Parameters are named (JSON objects). Listing creation reuses the core
//! `CreateListingRequest` shape.

use jobboard_core::application::{StatusCounts, TransitionOutcome};
use jobboard_core::domain::{JobPosting, PaymentOutcome, PostingContent, PricingTier};
use serde::{Deserialize, Serialize};

pub use jobboard_core::application::{CreateListingRequest, CreatedListing};

/// A posting as returned to clients, with its computed deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub posting: JobPosting,
    /// created_at + duration (epoch ms)
    pub expires_at: i64,
}

impl From<JobPosting> for ListingView {
    fn from(posting: JobPosting) -> Self {
        let expires_at = posting.expires_at();
        Self {
            posting,
            expires_at,
        }
    }
}

/// listing.update.v1
#[derive(Debug, Deserialize)]
pub struct UpdateListingRequest {
    pub posting_id: String,
    pub owner_id: String,
    pub content: PostingContent,
}

/// listing.get.v1
#[derive(Debug, Deserialize)]
pub struct GetListingRequest {
    pub posting_id: String,
}

/// listing.list.v1
#[derive(Debug, Deserialize)]
pub struct ListListingsRequest {
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListListingsResponse {
    pub listings: Vec<ListingView>,
}

/// listing.delete.v1 and listing.retry_payment.v1
#[derive(Debug, Deserialize)]
pub struct OwnedListingRequest {
    pub posting_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteListingResponse {
    pub posting_id: String,
    pub deleted: bool,
}

/// payment.complete.v1 - completion reported by a trusted internal caller
#[derive(Debug, Deserialize)]
pub struct CompletePaymentRequest {
    pub posting_id: String,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletePaymentResponse {
    pub posting_id: String,
    pub transition: TransitionOutcome,
}

/// pricing.tiers.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTiersResponse {
    pub tiers: Vec<PricingTier>,
}

/// admin.stats.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_listings: i64,
    pub pending_payment: i64,
    pub active: i64,
    pub expired: i64,
    pub pending_timers: i64,
    pub uptime_seconds: i64,
}

impl StatsResponse {
    pub fn new(counts: StatusCounts, pending_timers: i64, uptime_seconds: i64) -> Self {
        Self {
            total_listings: counts.pending_payment + counts.active + counts.expired,
            pending_payment: counts.pending_payment,
            active: counts.active,
            expired: counts.expired,
            pending_timers,
            uptime_seconds,
        }
    }
}
