//! Inbound provider events and `Stripe-Signature` verification

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Maximum age of a signed delivery, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is malformed")]
    Malformed,

    #[error("signature timestamp is outside the tolerance window")]
    Stale,

    #[error("no signature matches the payload")]
    Mismatch,
}

/// Check a `t=<unix>,v1=<hex>[,v1=...]` header against the raw request body.
///
/// The signed payload is `"{t}.{body}"`, HMAC-SHA256 keyed with the endpoint secret.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }

    let mac = signed_payload_mac(payload, timestamp, secret)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn signed_payload_mac(
    payload: &[u8],
    timestamp: i64,
    secret: &str,
) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Webhook payload as delivered by the provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl ProviderEvent {
    pub fn is_payment_success(&self) -> bool {
        self.event_type == PAYMENT_INTENT_SUCCEEDED
    }

    /// `data.object.metadata.booking_id`, if present and well formed
    pub fn booking_id(&self) -> Option<Uuid> {
        self.data
            .object
            .get("metadata")?
            .get("booking_id")?
            .as_str()
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}
