//! Booking route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings", get(list_my_bookings))
        .route("/api/bookings/:id/pay", post(pay_booking))
        .route("/api/bookings/:id/cancel", post(cancel_booking))
}
