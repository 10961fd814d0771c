//! Route definitions for the booking API

mod admin;
mod booking;
mod payment;

use axum::Router;

use crate::state::AppState;

pub use admin::admin_routes;
pub use booking::booking_routes;
pub use payment::payment_routes;

/// Every `/api` route, bound to its state
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(booking_routes())
        .merge(payment_routes())
        .merge(admin_routes())
        .with_state(state)
}
