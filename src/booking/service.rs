//! Booking service layer - business logic for the booking lifecycle

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    Booking, BookingError, BookingFilter, BookingStatus, ConfirmOutcome, CreateBookingRequest,
    DateRange, PageRequest, PayBookingRequest, PaymentSession,
};
use crate::models::{PaginatedResponse, Property};
use crate::notifications::{Notification, NotificationKind};
use crate::payments::{
    booking_metadata, refund_idempotency_key, PaymentGateway, PaymentIntentRequest, RefundRequest,
};
use crate::store::{AccountStore, BookingStore, PropertyStore, StoreError};
use crate::tasks::{BackgroundTask, TaskQueue};

/// Booking service managing the PENDING -> PAID -> CANCELED lifecycle
pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    properties: Arc<dyn PropertyStore>,
    accounts: Arc<dyn AccountStore>,
    gateway: Arc<dyn PaymentGateway>,
    tasks: TaskQueue,
    payment_window: Duration,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        properties: Arc<dyn PropertyStore>,
        accounts: Arc<dyn AccountStore>,
        gateway: Arc<dyn PaymentGateway>,
        tasks: TaskQueue,
        payment_window_minutes: i64,
    ) -> Self {
        Self {
            bookings,
            properties,
            accounts,
            gateway,
            tasks,
            payment_window: Duration::minutes(payment_window_minutes),
        }
    }

    /// Reserve a property for `[date_from, date_to)` in PENDING state
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        let dates = DateRange::new(request.date_from, request.date_to)?;
        if dates.starts_before(Utc::now().date_naive()) {
            return Err(BookingError::PastDate);
        }

        self.properties
            .get_property(request.property_id)
            .await?
            .ok_or(BookingError::PropertyNotFound)?;

        let booking = Booking::pending(
            user_id,
            request.property_id,
            dates,
            Utc::now() + self.payment_window,
        );
        let booking = self.bookings.insert_if_available(booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            property_id = %request.property_id,
            date_from = %booking.date_from,
            date_to = %booking.date_to,
            "Booking created"
        );
        Ok(booking)
    }

    /// Start a payment for a PENDING booking and return the client secret
    pub async fn pay_booking(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        request: PayBookingRequest,
    ) -> Result<PaymentSession, BookingError> {
        let booking = self.get_booking(booking_id).await?;

        let profile = self
            .accounts
            .get_payment_profile(user_id)
            .await?
            .ok_or(BookingError::PaymentProfileMissing)?;
        if !booking.is_owned_by(user_id) {
            return Err(BookingError::Forbidden);
        }
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::NotPayable);
        }
        if booking.payment_window_passed(Utc::now()) {
            self.tasks
                .enqueue(BackgroundTask::DeleteExpiredBooking { booking_id });
            tracing::info!(booking_id = %booking_id, "Payment window passed, booking scheduled for deletion");
            return Err(BookingError::PaymentWindowExpired);
        }

        let property = self.property_of(&booking).await?;
        let user = self
            .accounts
            .get_user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound)?;

        let intent = self
            .gateway
            .create_payment_intent(PaymentIntentRequest {
                customer_id: profile.customer_id,
                amount: property.price,
                currency: request.currency(),
                metadata: booking_metadata(booking_id),
                capture_method: request.capture_method().as_str().to_string(),
                receipt_email: user.email,
            })
            .await?;

        self.bookings
            .set_payment_reference(booking_id, &intent.id)
            .await?;

        tracing::info!(booking_id = %booking_id, payment_reference = %intent.id, "Payment started");
        Ok(PaymentSession {
            booking_id,
            payment_reference: intent.id,
            client_secret: intent.client_secret,
        })
    }

    /// Apply a successful payment. Safe to call any number of times.
    pub async fn confirm_payment(&self, booking_id: Uuid) -> Result<ConfirmOutcome, BookingError> {
        if let Some(booking) = self
            .bookings
            .transition_status(booking_id, BookingStatus::Pending, BookingStatus::Paid)
            .await?
        {
            for notification in Notification::both(NotificationKind::BookingConfirmation, booking.id) {
                self.tasks.enqueue(BackgroundTask::Notify(notification));
            }
            tracing::info!(booking_id = %booking_id, "Booking paid");
            return Ok(ConfirmOutcome::Confirmed);
        }

        let booking = self.get_booking(booking_id).await?;
        match booking.status {
            BookingStatus::Paid => {
                tracing::info!(booking_id = %booking_id, "Duplicate payment confirmation ignored");
                Ok(ConfirmOutcome::AlreadyPaid)
            }
            BookingStatus::Canceled => {
                tracing::warn!(booking_id = %booking_id, "Payment confirmed for a canceled booking");
                Ok(ConfirmOutcome::Ignored)
            }
            BookingStatus::Pending if booking.property_id.is_none() => {
                tracing::warn!(booking_id = %booking_id, "Payment confirmed for a booking whose property was removed");
                Ok(ConfirmOutcome::Ignored)
            }
            // Lost a race with a concurrent transition; the provider redelivers
            BookingStatus::Pending => Err(BookingError::Store(StoreError::Database(
                "booking status changed concurrently".to_string(),
            ))),
        }
    }

    /// Refund and cancel a PAID booking on behalf of its renter
    pub async fn cancel_booking(&self, user_id: Uuid, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.get_booking(booking_id).await?;
        if !booking.is_owned_by(user_id) {
            return Err(BookingError::Forbidden);
        }
        if !booking.status.can_transition_to(BookingStatus::Canceled) {
            return Err(BookingError::CannotCancel);
        }

        let property = self.property_of(&booking).await?;

        // Claim the booking first so that only one caller reaches the refund
        let canceled = self
            .bookings
            .transition_status(booking_id, BookingStatus::Paid, BookingStatus::Canceled)
            .await?
            .ok_or(BookingError::CannotCancel)?;

        let refund = match self
            .gateway
            .create_refund(RefundRequest {
                payment_intent_id: booking.payment_reference.clone(),
                amount: property.price,
                metadata: booking_metadata(booking_id),
                idempotency_key: refund_idempotency_key(booking_id),
            })
            .await
        {
            Ok(refund) => refund,
            Err(e) => {
                tracing::warn!(booking_id = %booking_id, error = %e, "Refund failed, restoring paid status");
                self.restore_paid(booking_id).await;
                return Err(e.into());
            }
        };

        for notification in Notification::both(NotificationKind::BookingCancellation, booking_id) {
            self.tasks.enqueue(BackgroundTask::Notify(notification));
        }

        tracing::info!(booking_id = %booking_id, refund_id = %refund.id, "Booking canceled");
        Ok(canceled)
    }

    /// Remove a booking outright. Removing a missing booking is a no-op.
    pub async fn delete_booking(&self, booking_id: Uuid) -> Result<bool, BookingError> {
        Ok(self.bookings.delete_booking(booking_id).await?)
    }

    /// Remove every PENDING booking whose payment window has closed
    pub async fn sweep_expired(&self) -> Result<Vec<Uuid>, BookingError> {
        Ok(self.bookings.delete_expired_pending(Utc::now()).await?)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)
    }

    /// List bookings with filtering and pagination
    pub async fn list_bookings(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<Booking>, BookingError> {
        Ok(self.bookings.list_bookings(&filter, &page).await?)
    }

    pub async fn list_user_bookings(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<PaginatedResponse<Booking>, BookingError> {
        self.list_bookings(BookingFilter::for_user(user_id), page).await
    }

    async fn restore_paid(&self, booking_id: Uuid) {
        match self
            .bookings
            .transition_status(booking_id, BookingStatus::Canceled, BookingStatus::Paid)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::error!(booking_id = %booking_id, "Booking changed before it could be restored to paid");
            }
            Err(e) => {
                tracing::error!(booking_id = %booking_id, error = %e, "Failed to restore booking to paid");
            }
        }
    }

    async fn property_of(&self, booking: &Booking) -> Result<Property, BookingError> {
        let property_id = booking.property_id.ok_or(BookingError::PropertyNotFound)?;
        self.properties
            .get_property(property_id)
            .await?
            .ok_or(BookingError::PropertyNotFound)
    }
}
