// Create Listing Use Case

use super::LifecycleOrchestrator;
use crate::domain::{
    DomainError, JobPosting, PostingContent, PostingId, PostingStatus, PricingTier,
};
use crate::error::{AppError, Result};
use crate::port::{CheckoutRequest, CheckoutSession};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Longest accepted idempotency key
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Create listing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateListingRequest {
    pub owner_id: String,
    pub content: PostingContent,
    pub duration_days: u32,

    /// Same key from the same owner => same posting
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Result of `create_listing` / `retry_payment`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedListing {
    pub posting_id: PostingId,
    pub status: PostingStatus,
    pub redirect_url: String,
}

fn validate_request(req: &CreateListingRequest) -> Result<()> {
    if req.owner_id.trim().is_empty() {
        return Err(DomainError::Validation("Owner ID cannot be empty".to_string()).into());
    }
    if let Some(key) = &req.idempotency_key {
        if key.trim().is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(DomainError::Validation(format!(
                "Idempotency key must be 1-{} characters",
                MAX_IDEMPOTENCY_KEY_LEN
            ))
            .into());
        }
    }
    req.content.validate()?;
    Ok(())
}

impl LifecycleOrchestrator {
    /// Create a posting in `PENDING_PAYMENT`, arm its expiration and start checkout
    ///
    /// Order matters: the record is durably stored before the timer is armed or
    /// the payment is started, so no signal can target a missing posting.
    /// Tier lookup and validation happen before any write.
    ///
    /// A retry carrying the same idempotency key resumes the original posting:
    /// arming is idempotent and a stored checkout URL is reused.
    ///
    /// # Errors
    /// - `InvalidDuration` if no tier matches (nothing persisted)
    /// - `Validation` for malformed content
    /// - infrastructure errors from store / scheduler / gateway (propagated);
    ///   a scheduler failure removes the just-stored posting first
    pub async fn create_listing(&self, req: CreateListingRequest) -> Result<CreatedListing> {
        validate_request(&req)?;
        let tier = self.pricing.require(req.duration_days)?.clone();

        if let Some(key) = &req.idempotency_key {
            if let Some(existing) = self.store.find_by_idempotency_key(&req.owner_id, key).await? {
                debug!(posting_id = %existing.id, "Idempotent create replay");
                return self.resume_creation(existing, &req).await;
            }
        }

        let posting = JobPosting::new(
            self.id_provider.generate_id(),
            req.owner_id.clone(),
            req.content.clone(),
            tier.days,
            self.time_provider.now_millis(),
        )
        .with_idempotency_key(req.idempotency_key.clone());

        if !self.store.insert(&posting).await? {
            // A concurrent request with the same key won the insert
            let key = req.idempotency_key.as_deref().unwrap_or_default();
            let existing = self
                .store
                .find_by_idempotency_key(&req.owner_id, key)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "Insert for owner {} reported a duplicate key but no posting holds it",
                        req.owner_id
                    ))
                })?;
            return self.resume_creation(existing, &req).await;
        }

        info!(
            posting_id = %posting.id,
            owner_id = %posting.owner_id,
            duration_days = posting.listing_duration_days,
            "Posting created"
        );

        if let Err(e) = self.arm_expiration(&posting).await {
            self.roll_back_unarmed(&posting).await;
            return Err(e);
        }
        let session = self.start_checkout(&posting, &tier).await?;

        Ok(CreatedListing {
            posting_id: posting.id,
            status: PostingStatus::PendingPayment,
            redirect_url: session.redirect_url,
        })
    }

    /// Start a fresh checkout for a posting still awaiting payment
    ///
    /// # Errors
    /// - `NotFound` / `Forbidden`
    /// - `Terminal` if expired, `AlreadyActive` if already paid
    /// - `InvalidDuration` if the posting's tier was removed from the table
    /// - infrastructure errors if the expiration cannot be armed (no checkout
    ///   is started)
    pub async fn retry_payment(
        &self,
        posting_id: &PostingId,
        owner_id: &str,
    ) -> Result<CreatedListing> {
        let posting = self.get_listing(posting_id).await?;
        posting.ensure_owned_by(owner_id)?;

        match posting.status {
            PostingStatus::Expired => Err(DomainError::Terminal(posting.id).into()),
            PostingStatus::Active => Err(DomainError::AlreadyActive(posting.id).into()),
            PostingStatus::PendingPayment => {
                let tier = self.pricing.require(posting.listing_duration_days)?.clone();
                self.ensure_armed(&posting).await?;
                let attempt_key = format!(
                    "checkout-{}-retry-{}",
                    posting.id,
                    self.time_provider.now_millis()
                );
                let session = self.start_checkout_with_key(&posting, &tier, attempt_key).await?;

                info!(posting_id = %posting.id, "Payment retry started");
                Ok(CreatedListing {
                    posting_id: posting.id,
                    status: PostingStatus::PendingPayment,
                    redirect_url: session.redirect_url,
                })
            }
        }
    }

    /// Finish a creation whose posting already exists (idempotent replay)
    async fn resume_creation(
        &self,
        existing: JobPosting,
        req: &CreateListingRequest,
    ) -> Result<CreatedListing> {
        if existing.listing_duration_days != req.duration_days {
            return Err(DomainError::Validation(format!(
                "Idempotency key reused with a different duration ({} vs {} days)",
                existing.listing_duration_days, req.duration_days
            ))
            .into());
        }

        if !existing.status.is_terminal() {
            self.arm_expiration(&existing).await?;
        }

        if let Some(url) = &existing.checkout_url {
            return Ok(CreatedListing {
                posting_id: existing.id.clone(),
                status: existing.status,
                redirect_url: url.clone(),
            });
        }

        match existing.status {
            PostingStatus::PendingPayment => {
                warn!(
                    posting_id = %existing.id,
                    "Resuming creation without a checkout, starting one"
                );
                let tier = self.pricing.require(existing.listing_duration_days)?.clone();
                let session = self.start_checkout(&existing, &tier).await?;
                Ok(CreatedListing {
                    posting_id: existing.id,
                    status: PostingStatus::PendingPayment,
                    redirect_url: session.redirect_url,
                })
            }
            PostingStatus::Active => Err(DomainError::AlreadyActive(existing.id).into()),
            PostingStatus::Expired => Err(DomainError::Terminal(existing.id).into()),
        }
    }

    /// Arm (or re-arm, as a no-op) the expiration for the remaining duration
    async fn arm_expiration(&self, posting: &JobPosting) -> Result<()> {
        let delay_ms = (posting.expires_at() - self.time_provider.now_millis()).max(0);
        let armed = self.scheduler.arm_after(&posting.id, delay_ms).await?;

        if armed {
            info!(posting_id = %posting.id, delay_ms = delay_ms, "Expiration armed");
        } else {
            debug!(posting_id = %posting.id, "Expiration already armed");
        }
        Ok(())
    }

    /// Arm the expiration only if the posting has no timer yet
    pub(super) async fn ensure_armed(&self, posting: &JobPosting) -> Result<()> {
        if self.scheduler.is_armed(&posting.id).await? {
            return Ok(());
        }
        warn!(posting_id = %posting.id, status = %posting.status, "Posting had no expiration timer");
        self.arm_expiration(posting).await
    }

    /// Remove a just-inserted posting whose timer could not be armed
    ///
    /// If the delete fails too, the posting stays without a timer until
    /// `ensure_armed` runs on retry or completion, or startup recovery.
    async fn roll_back_unarmed(&self, posting: &JobPosting) {
        match self.store.delete(&posting.id).await {
            Ok(_) => warn!(
                posting_id = %posting.id,
                "Expiration could not be armed, creation rolled back"
            ),
            Err(e) => error!(
                posting_id = %posting.id,
                error = %e,
                "Expiration could not be armed and rollback failed"
            ),
        }
    }

    async fn start_checkout(
        &self,
        posting: &JobPosting,
        tier: &PricingTier,
    ) -> Result<CheckoutSession> {
        let key = format!("checkout-{}", posting.id);
        self.start_checkout_with_key(posting, tier, key).await
    }

    async fn start_checkout_with_key(
        &self,
        posting: &JobPosting,
        tier: &PricingTier,
        idempotency_key: String,
    ) -> Result<CheckoutSession> {
        let request = CheckoutRequest {
            posting_id: posting.id.clone(),
            owner_id: posting.owner_id.clone(),
            amount_minor_units: tier.amount_minor_units(),
            product_name: tier.product_name(),
            description: tier.description.clone(),
            idempotency_key,
        };

        let session = self.gateway.start_transaction(&request).await?;
        self.store.record_checkout(&posting.id, &session).await?;

        info!(
            posting_id = %posting.id,
            session_id = %session.session_id,
            amount = request.amount_minor_units,
            "Checkout started"
        );
        Ok(session)
    }
}
