//! Payment route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/profile", post(create_payment_profile))
        .route("/api/payments/webhook", post(payment_webhook))
}
