//! Booking domain module
//!
//! Contains the lifecycle engine, its models and its error taxonomy.

mod error;
mod model;
mod service;

pub use error::BookingError;
pub use model::*;
pub use service::BookingService;
