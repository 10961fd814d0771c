//! Booking notifications
//!
//! Notifications are queued by the booking engine and delivered later by the
//! task worker. Delivery failures are logged and dropped.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::booking::Booking;
use crate::models::{Property, User};

/// Notification delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Delivery(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmation,
    BookingCancellation,
}

/// Who receives the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    Renter,
    Owner,
}

/// A queued notification; the worker resolves addresses at delivery time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub booking_id: Uuid,
}

impl Notification {
    /// The renter and owner pair sent on every transition
    pub fn both(kind: NotificationKind, booking_id: Uuid) -> [Notification; 2] {
        [
            Notification {
                kind,
                recipient: Recipient::Renter,
                booking_id,
            },
            Notification {
                kind,
                recipient: Recipient::Owner,
                booking_id,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// Build the email for a notification
pub fn render(
    notification: &Notification,
    from: &str,
    to: &User,
    booking: &Booking,
    property: &Property,
) -> OutgoingEmail {
    let nights = booking.dates().nights();
    let stay = format!(
        "{} in {} for {} night{} ({} - {})",
        property.name,
        property.city,
        nights,
        if nights == 1 { "" } else { "s" },
        booking.date_from,
        booking.date_to
    );
    let (subject, body) = match (notification.kind, notification.recipient) {
        (NotificationKind::BookingConfirmation, Recipient::Renter) => (
            "Your booking is confirmed".to_string(),
            format!(
                "Hello {},\n\nyour payment was received and your stay at {} is confirmed.\nReference code: {}",
                to.full_name(),
                stay,
                booking.reference_code
            ),
        ),
        (NotificationKind::BookingConfirmation, Recipient::Owner) => (
            "New booking for your property".to_string(),
            format!("Hello {},\n\n{} has been booked and paid.", to.full_name(), stay),
        ),
        (NotificationKind::BookingCancellation, Recipient::Renter) => (
            "Your booking was canceled".to_string(),
            format!(
                "Hello {},\n\nyour booking of {} was canceled and the payment refunded.",
                to.full_name(),
                stay
            ),
        ),
        (NotificationKind::BookingCancellation, Recipient::Owner) => (
            "A booking was canceled".to_string(),
            format!(
                "Hello {},\n\nthe booking of {} was canceled by the guest.",
                to.full_name(),
                stay
            ),
        ),
    };

    OutgoingEmail {
        from: from.to_string(),
        to: to.email.clone(),
        subject,
        body,
    }
}

/// Writes emails to the log instead of sending them
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Posts emails as JSON to a mail relay
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpNotifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let response = self.client.post(&self.endpoint).json(email).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "relay returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
