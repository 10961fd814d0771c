//! Administrative booking handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use super::{page_request, AdminUser};
use crate::booking::{Booking, BookingFilter};
use crate::error::ApiError;
use crate::models::{ApiResponse, PaginatedResponse, PaginationParams};
use crate::state::AppState;

/// GET /api/admin/bookings - All bookings with filters
pub async fn admin_list_bookings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(filter): Query<BookingFilter>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Booking>>>, ApiError> {
    let page = page_request(&params, state.default_page_size)?;
    tracing::debug!(admin_id = %admin.user_id, filter = ?filter, "Admin booking listing");

    let bookings = state.booking_service.list_bookings(filter, page).await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

/// GET /api/admin/bookings/:id
pub async fn admin_get_booking(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = state.booking_service.get_booking(booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}
