// Sandbox PaymentGateway for local runs without provider credentials
//
// Checkouts point at the local webhook server's sandbox page; the payment is
// then completed with `payment.complete.v1` (or `jobboard complete-payment`).

use async_trait::async_trait;
use jobboard_core::error::Result;
use jobboard_core::port::{CheckoutRequest, CheckoutSession, PaymentGateway};
use tracing::info;

pub struct SandboxCheckoutGateway {
    public_url: String,
}

impl SandboxCheckoutGateway {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SandboxCheckoutGateway {
    async fn start_transaction(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        info!(
            posting_id = %request.posting_id,
            amount = request.amount_minor_units,
            product = %request.product_name,
            "Sandbox checkout started"
        );

        Ok(CheckoutSession {
            session_id: format!("sandbox_{}", request.idempotency_key),
            redirect_url: format!(
                "{}/payment/sandbox?posting_id={}",
                self.public_url, request.posting_id
            ),
        })
    }
}
