//! Renter-facing booking handlers

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::{page_request, AuthenticatedUser};
use crate::booking::{Booking, CreateBookingRequest, PayBookingRequest, PaymentSession};
use crate::error::ApiError;
use crate::models::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::state::AppState;

/// POST /api/bookings - Reserve a property
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    let booking = state
        .booking_service
        .create_booking(user.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(booking))))
}

/// GET /api/bookings - The caller's own bookings
pub async fn list_my_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Booking>>>, ApiError> {
    let page = page_request(&params, state.default_page_size)?;
    let bookings = state
        .booking_service
        .list_user_bookings(user.user_id, page)
        .await?;

    Ok(Json(ApiResponse::ok(bookings)))
}

/// POST /api/bookings/:id/pay - Start the payment of a pending booking.
/// An empty body uses the default currency and capture method.
pub async fn pay_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<PaymentSession>>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        PayBookingRequest::default()
    } else {
        serde_json::from_slice::<PayBookingRequest>(&body)
            .map_err(|e| ApiError::ValidationError(format!("Invalid payment request: {}", e)))?
    };
    request.validate()?;

    let session = state
        .booking_service
        .pay_booking(user.user_id, booking_id, request)
        .await?;

    Ok(Json(ApiResponse::ok(session)))
}

/// POST /api/bookings/:id/cancel - Refund and cancel a paid booking
pub async fn cancel_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = state
        .booking_service
        .cancel_booking(user.user_id, booking_id)
        .await?;

    Ok(Json(ApiResponse::ok(booking)))
}
