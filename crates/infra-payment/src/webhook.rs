//! Payment webhook verification and event decoding.
//!
//! The provider signs each delivery with HMAC-SHA256 over `"{timestamp}.{body}"`
//! and sends `Stripe-Signature: t=<unix seconds>,v1=<hex>[,v1=<hex>...]`.
//! Verification happens before the body is parsed; deliveries older than the
//! tolerance are rejected to limit replays.

use hmac::{Hmac, Mac};
use jobboard_core::domain::{PaymentOutcome, PostingId};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum accepted age (and clock skew) of a delivery, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Metadata key the checkout is tagged with
pub const POSTING_ID_METADATA_KEY: &str = "posting_id";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("no signature matches the payload")]
    SignatureMismatch,

    #[error("timestamp {timestamp} outside tolerance (now {now})")]
    TimestampOutOfTolerance { timestamp: i64, now: i64 },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// A parsed `t=...,v1=...` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

/// Parse a signature header. Unknown schemes (e.g. `v0=`) are skipped.
///
/// Returns `None` without a timestamp, without any `v1` signature, or with
/// undecodable hex.
pub fn parse_signature_header(header: &str) -> Option<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        match key {
            "t" => timestamp = Some(value.parse::<i64>().ok()?),
            "v1" => signatures.push(hex::decode(value).ok()?),
            _ => {}
        }
    }

    if signatures.is_empty() {
        return None;
    }
    Some(SignatureHeader {
        timestamp: timestamp?,
        signatures,
    })
}

/// HMAC-SHA256 of `"{timestamp}.{payload}"`
pub fn compute_signature(payload: &[u8], timestamp: i64, secret: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Header value for a payload (used by tests and local tooling)
pub fn format_signature_header(payload: &[u8], timestamp: i64, secret: &[u8]) -> String {
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(compute_signature(payload, timestamp, secret))
    )
}

/// Verify a delivery
///
/// # Arguments
///
/// * `payload` - Raw request body, exactly as received
/// * `header` - Value of the signature header
/// * `secret` - Webhook signing secret
/// * `now_secs` - Current Unix time in seconds
/// * `tolerance_secs` - Allowed distance between `t` and `now_secs`
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &[u8],
    now_secs: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let parsed = parse_signature_header(header).ok_or(WebhookError::MalformedSignature)?;

    let expected = compute_signature(payload, parsed.timestamp, secret);
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    if (now_secs - parsed.timestamp).abs() > tolerance_secs {
        return Err(WebhookError::TimestampOutOfTolerance {
            timestamp: parsed.timestamp,
            now: now_secs,
        });
    }
    Ok(())
}

/// What a verified delivery means for the listing lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Completion {
        posting_id: PostingId,
        outcome: PaymentOutcome,
    },
    /// Event type we do not act on (acknowledged so it is not redelivered)
    Ignored { event_type: String },
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: CheckoutObject,
}

#[derive(Debug, Deserialize)]
struct CheckoutObject {
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

/// Decode a verified body into a `PaymentEvent`
///
/// | event type                                   | outcome                     |
/// |----------------------------------------------|-----------------------------|
/// | checkout.session.completed                   | success if paid, else ignored |
/// | checkout.session.async_payment_succeeded     | success                     |
/// | checkout.session.async_payment_failed        | failure                     |
/// | checkout.session.expired                     | failure                     |
/// | anything else                                | ignored                     |
pub fn parse_event(payload: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let envelope: serde_json::Value = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let event_type = envelope
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| WebhookError::InvalidPayload("missing event type".to_string()))?
        .to_string();

    let outcome = match event_type.as_str() {
        "checkout.session.completed" => None,
        "checkout.session.async_payment_succeeded" => Some(PaymentOutcome::Success),
        "checkout.session.async_payment_failed" | "checkout.session.expired" => {
            Some(PaymentOutcome::Failure)
        }
        _ => return Ok(PaymentEvent::Ignored { event_type }),
    };

    let envelope: EventEnvelope = serde_json::from_value(envelope)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;
    let object = envelope.data.object;

    let outcome = match outcome {
        Some(outcome) => outcome,
        // Delayed methods report completed/unpaid first, then async_payment_*
        None => match object.payment_status.as_deref() {
            Some("paid") | Some("no_payment_required") => PaymentOutcome::Success,
            _ => {
                return Ok(PaymentEvent::Ignored {
                    event_type: envelope.event_type,
                })
            }
        },
    };

    let posting_id = object
        .metadata
        .get(POSTING_ID_METADATA_KEY)
        .filter(|id| !id.trim().is_empty())
        .cloned()
        .ok_or_else(|| {
            WebhookError::InvalidPayload(format!("{} without metadata.posting_id", event_type))
        })?;

    Ok(PaymentEvent::Completion {
        posting_id,
        outcome,
    })
}
