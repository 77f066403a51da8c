// Payment Gateway Port
// Starts an external checkout; completion comes back asynchronously
// (webhook -> LifecycleOrchestrator::apply_payment_completion)

use crate::domain::PostingId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What to charge for one posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Correlation ID echoed back in the completion signal
    pub posting_id: PostingId,
    pub owner_id: String,
    /// Minor units of the configured currency
    pub amount_minor_units: i64,
    pub product_name: String,
    pub description: String,
    /// Provider-side dedup key (stable per posting)
    pub idempotency_key: String,
}

/// A started checkout transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    /// Where the owner is sent to pay
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout transaction tagged with `request.posting_id`
    ///
    /// # Errors
    /// - AppError::Gateway if the provider rejects or cannot be reached
    async fn start_transaction(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every request; optionally fails
    #[derive(Default)]
    pub struct MockPaymentGateway {
        requests: Mutex<Vec<CheckoutRequest>>,
        fail: AtomicBool,
    }

    impl MockPaymentGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing() -> Self {
            let gateway = Self::default();
            gateway.set_fail(true);
            gateway
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn requests(&self) -> Vec<CheckoutRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PaymentGateway for MockPaymentGateway {
        async fn start_transaction(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Gateway("mock gateway unavailable".to_string()));
            }

            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());

            Ok(CheckoutSession {
                session_id: format!("cs_mock_{}", requests.len()),
                redirect_url: format!("https://checkout.test/pay/{}", request.posting_id),
            })
        }
    }
}
