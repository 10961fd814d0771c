//! Admin route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/bookings", get(admin_list_bookings))
        .route("/api/admin/bookings/:id", get(admin_get_booking))
}
