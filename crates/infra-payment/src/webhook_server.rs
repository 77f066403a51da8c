// Payment Webhook HTTP Server
//
// Status codes drive provider redelivery:
// - 400: unverifiable or undecodable delivery (never retried usefully)
// - 200: handled, ignored, or unknown posting (do not redeliver)
// - 500: store/infrastructure failure (provider redelivers later)

use crate::webhook::{
    parse_event, verify_signature, PaymentEvent, WebhookError, DEFAULT_TOLERANCE_SECS,
    SIGNATURE_HEADER,
};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use jobboard_core::application::{LifecycleOrchestrator, ShutdownToken};
use jobboard_core::port::TimeProvider;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub const PAYMENT_WEBHOOK_PATH: &str = "/webhooks/payment";

/// Shared handler state
#[derive(Clone)]
pub struct WebhookState {
    orchestrator: Arc<LifecycleOrchestrator>,
    secret: Arc<str>,
    time_provider: Arc<dyn TimeProvider>,
    tolerance_secs: i64,
}

impl WebhookState {
    pub fn new(
        orchestrator: Arc<LifecycleOrchestrator>,
        secret: impl Into<String>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            orchestrator,
            secret: Arc::from(secret.into()),
            time_provider,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route(PAYMENT_WEBHOOK_PATH, post(handle_payment_webhook))
        .route("/payment/sandbox", get(sandbox_checkout))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state)
}

/// Serve until the shutdown token fires
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: ShutdownToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Webhook server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}

fn reject(err: WebhookError) -> (StatusCode, Json<Value>) {
    warn!(error = %err, "Webhook delivery rejected");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": err.to_string() })),
    )
}

async fn handle_payment_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let Some(header) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return reject(WebhookError::MissingSignature);
    };

    let now_secs = state.time_provider.now_millis() / 1000;
    if let Err(e) = verify_signature(
        &body,
        header,
        state.secret.as_bytes(),
        now_secs,
        state.tolerance_secs,
    ) {
        return reject(e);
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => return reject(e),
    };

    let (posting_id, outcome) = match event {
        PaymentEvent::Ignored { event_type } => {
            debug!(event_type = %event_type, "Webhook event ignored");
            return (
                StatusCode::OK,
                Json(json!({ "received": true, "handled": false })),
            );
        }
        PaymentEvent::Completion {
            posting_id,
            outcome,
        } => (posting_id, outcome),
    };

    match state
        .orchestrator
        .apply_payment_completion(&posting_id, outcome)
        .await
    {
        Ok(transition) => (
            StatusCode::OK,
            Json(json!({ "received": true, "handled": true, "transition": transition })),
        ),
        Err(e) if e.is_infrastructure() => {
            error!(posting_id = %posting_id, error = %e, "Payment completion failed, provider will redeliver");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "temporarily unavailable" })),
            )
        }
        Err(e) => {
            warn!(posting_id = %posting_id, error = %e, "Payment completion dropped");
            (
                StatusCode::OK,
                Json(json!({ "received": true, "handled": false, "reason": e.to_string() })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct SandboxQuery {
    posting_id: String,
}

/// Landing page for sandbox checkouts; payment is completed out of band
async fn sandbox_checkout(Query(query): Query<SandboxQuery>) -> Json<Value> {
    Json(json!({
        "posting_id": query.posting_id,
        "sandbox": true,
        "complete_with": format!("jobboard complete-payment {}", query.posting_id),
    }))
}
