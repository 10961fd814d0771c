//! Middleware for the booking API
//!
//! Request tracing and bearer-token authentication extractors.

pub mod auth;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser};
pub use tracing::request_tracing;
