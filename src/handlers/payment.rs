//! Payment profile and provider webhook handlers

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Serialize;

use super::AuthenticatedUser;
use crate::booking::ConfirmOutcome;
use crate::error::ApiError;
use crate::models::{ApiResponse, PaymentProfile};
use crate::payments::{verify_signature, ProviderEvent, SIGNATURE_HEADER};
use crate::state::AppState;

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ConfirmOutcome>,
}

/// POST /api/payments/profile - Register the caller with the payment provider
pub async fn create_payment_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<PaymentProfile>>, ApiError> {
    let profile = state.payment_profiles.ensure_profile(user.user_id).await?;
    Ok(Json(ApiResponse::ok(profile)))
}

/// POST /api/payments/webhook - Provider event delivery, signed with `Stripe-Signature`
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let Some(secret) = state.webhook_secret.as_deref().filter(|s| !s.is_empty()) else {
        // Fail closed
        tracing::error!("Webhook secret not configured - rejecting request");
        return Err(ApiError::ServiceUnavailable(
            "Webhook endpoint is not configured".to_string(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = verify_signature(&body, signature, secret, Utc::now().timestamp()) {
        tracing::warn!(error = %e, "Rejected webhook delivery");
        return Err(ApiError::Unauthorized(
            "Unauthorized webhook request".to_string(),
        ));
    }

    let event: ProviderEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid event payload: {}", e)))?;

    if !event.is_payment_success() {
        tracing::debug!(event_type = %event.event_type, event_id = ?event.id, "Provider event ignored");
        return Ok(Json(ApiResponse::ok(WebhookAck {
            received: true,
            outcome: None,
        })));
    }

    let booking_id = event.booking_id().ok_or_else(|| {
        tracing::warn!(event_id = ?event.id, "Payment event without booking metadata");
        ApiError::ValidationError("metadata.booking_id is missing or invalid".to_string())
    })?;

    let outcome = state.booking_service.confirm_payment(booking_id).await?;

    Ok(Json(ApiResponse::ok(WebhookAck {
        received: true,
        outcome: Some(outcome),
    })))
}
