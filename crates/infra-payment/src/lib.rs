// Job Board Infrastructure - Payment Provider Adapter
// Implements: PaymentGateway (hosted checkout), signed completion webhook

mod sandbox_gateway;
mod stripe_gateway;
pub mod webhook;
mod webhook_server;

pub use sandbox_gateway::SandboxCheckoutGateway;
pub use stripe_gateway::{StripeCheckoutGateway, StripeConfig, DEFAULT_STRIPE_API_BASE};
pub use webhook::{PaymentEvent, WebhookError};
pub use webhook_server::{router, serve, WebhookState, PAYMENT_WEBHOOK_PATH};
