// Stripe hosted-checkout PaymentGateway

use async_trait::async_trait;
use jobboard_core::error::{AppError, Result};
use jobboard_core::port::{CheckoutRequest, CheckoutSession, PaymentGateway};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::webhook::POSTING_ID_METADATA_KEY;

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Connection and redirect settings
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Overridable for tests and mock servers
    pub api_base: String,
    /// ISO currency code, lowercase (e.g. "usd")
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl StripeConfig {
    /// Redirect URLs under `public_url` (`/payment/success`, `/payment/cancel`)
    pub fn new(secret_key: impl Into<String>, public_url: &str, currency: &str) -> Self {
        let base = public_url.trim_end_matches('/');
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            currency: currency.to_lowercase(),
            success_url: format!("{}/payment/success", base),
            cancel_url: format!("{}/payment/cancel", base),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

pub struct StripeCheckoutGateway {
    client: Client,
    config: StripeConfig,
}

impl StripeCheckoutGateway {
    pub fn new(client: Client, config: StripeConfig) -> Self {
        Self { client, config }
    }

    fn session_endpoint(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// Form fields for one single-item payment session
    fn form_fields(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let metadata_key = format!("metadata[{}]", POSTING_ID_METADATA_KEY);
        vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.config.success_url.clone()),
            ("cancel_url".to_string(), self.config.cancel_url.clone()),
            ("client_reference_id".to_string(), request.posting_id.clone()),
            (metadata_key, request.posting_id.clone()),
            ("metadata[owner_id]".to_string(), request.owner_id.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                self.config.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_minor_units.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".to_string(),
                request.description.clone(),
            ),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeCheckoutGateway {
    async fn start_transaction(&self, request: &CheckoutRequest) -> Result<CheckoutSession> {
        let response = self
            .client
            .post(self.session_endpoint())
            .bearer_auth(&self.config.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&self.form_fields(request))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("checkout request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(
                posting_id = %request.posting_id,
                status = status.as_u16(),
                "Checkout session rejected"
            );
            return Err(AppError::Gateway(format!(
                "checkout status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let session: SessionResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::Gateway(format!("checkout response parse failed: {}", e)))?;
        let redirect_url = session.url.ok_or_else(|| {
            AppError::Gateway(format!("checkout session {} has no url", session.id))
        })?;

        debug!(posting_id = %request.posting_id, session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url,
        })
    }
}
