//! Storage ports for the booking engine
//!
//! The engine talks to these traits only. `PgStore` backs production and
//! `InMemoryStore` backs tests and local demos.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::booking::{Booking, BookingFilter, BookingStatus, PageRequest};
use crate::models::{PaginatedResponse, PaymentProfile, Property, User};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A non-canceled booking already covers part of the requested dates
    #[error("Requested dates overlap an existing booking")]
    Unavailable,

    #[error("Property not found")]
    PropertyNotFound,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        // 23P01: exclusion_violation from the booking overlap constraint
        let is_overlap = err
            .as_database_error()
            .and_then(|e| e.code())
            .map(|code| code == "23P01")
            .unwrap_or(false);
        if is_overlap {
            StoreError::Unavailable
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert `booking` unless a non-canceled booking of the same property
    /// overlaps its dates. Check and insert are atomic.
    async fn insert_if_available(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn set_payment_reference(&self, id: Uuid, reference: &str) -> Result<(), StoreError>;

    /// Compare-and-set the status. Returns the updated booking, or `None` when
    /// the booking is missing, not in `from`, or no longer attached to a property.
    /// Leaving CANCELED fails with `Unavailable` if the dates were taken meanwhile.
    async fn transition_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Booking>, StoreError>;

    /// Returns whether a row was removed
    async fn delete_booking(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Remove PENDING bookings whose payment window closed before `now`
    async fn delete_expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<Booking>, StoreError>;
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    async fn get_property(&self, id: Uuid) -> Result<Option<Property>, StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn get_payment_profile(&self, user_id: Uuid) -> Result<Option<PaymentProfile>, StoreError>;

    async fn save_payment_profile(&self, profile: PaymentProfile) -> Result<PaymentProfile, StoreError>;
}
