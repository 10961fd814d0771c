//! Booking engine error taxonomy

use thiserror::Error;

use crate::payments::GatewayError;
use crate::store::StoreError;

/// Every failure a booking operation can report to its caller
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("The end date must be after the start date")]
    InvalidDateRange,

    #[error("Booking dates must be in the future")]
    PastDate,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("This property is already booked for these dates")]
    PropertyUnavailable,

    #[error("Only paid bookings can be canceled")]
    CannotCancel,

    #[error("Booking is not awaiting payment")]
    NotPayable,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("No payment profile is registered for this user")]
    PaymentProfileMissing,

    #[error("The time for payment has already passed. Please start the booking again")]
    PaymentWindowExpired,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("Property not found")]
    PropertyNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Payment provider error: {0}")]
    PaymentProvider(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable => BookingError::PropertyUnavailable,
            StoreError::PropertyNotFound => BookingError::PropertyNotFound,
            other => BookingError::Store(other),
        }
    }
}
