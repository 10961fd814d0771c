//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::JwtConfig;
use crate::booking::BookingService;
use crate::payments::PaymentProfileService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub booking_service: Arc<BookingService>,
    pub payment_profiles: Arc<PaymentProfileService>,
    pub jwt: Arc<JwtConfig>,
    pub webhook_secret: Option<String>,
    pub default_page_size: u32,
}

impl AppState {
    pub fn new(
        booking_service: Arc<BookingService>,
        payment_profiles: Arc<PaymentProfileService>,
        jwt: JwtConfig,
        webhook_secret: Option<String>,
        default_page_size: u32,
    ) -> Self {
        Self {
            booking_service,
            payment_profiles,
            jwt: Arc::new(jwt),
            webhook_secret,
            default_page_size,
        }
    }
}

impl FromRef<AppState> for Arc<JwtConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.jwt.clone()
    }
}

impl FromRef<AppState> for Arc<BookingService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.booking_service.clone()
    }
}
