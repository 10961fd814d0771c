//! Payment provider integration
//!
//! The booking engine depends on the [`PaymentGateway`] trait only; `StripeGateway`
//! is the production implementation.

mod profile;
mod stripe;
mod webhook;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use profile::PaymentProfileService;
pub use stripe::StripeGateway;
pub use webhook::{verify_signature, ProviderEvent, SignatureError, SIGNATURE_HEADER};

/// Payment provider errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The provider answered and refused the request
    #[error("{0}")]
    Rejected(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("amount {0} cannot be charged")]
    InvalidAmount(Decimal),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// Metadata attached to intents and refunds
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntentRequest {
    pub customer_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub metadata: Metadata,
    pub capture_method: String,
    pub receipt_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundRequest {
    pub payment_intent_id: String,
    pub amount: Decimal,
    pub metadata: Metadata,
    /// Sent as `Idempotency-Key` so a retried refund is never applied twice
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a customer and return the provider's customer id
    async fn create_customer(&self, email: &str) -> Result<String, GatewayError>;

    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    async fn create_refund(&self, request: RefundRequest) -> Result<Refund, GatewayError>;
}

/// Convert a price to the provider's minor units, truncating sub-cent digits
pub fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    if amount.is_sign_negative() {
        return Err(GatewayError::InvalidAmount(amount));
    }
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or(GatewayError::InvalidAmount(amount))
}

pub fn refund_idempotency_key(booking_id: uuid::Uuid) -> String {
    format!("refund-{}", booking_id)
}

pub fn booking_metadata(booking_id: uuid::Uuid) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("booking_id".to_string(), booking_id.to_string());
    metadata
}
