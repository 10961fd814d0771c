//! Booking models and data structures

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::BookingError;
use crate::models::PropertyType;

pub const REFERENCE_CODE_LEN: usize = 6;
const REFERENCE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Null once the property has been removed
    pub property_id: Option<Uuid>,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub status: BookingStatus,
    /// Payment intent id issued by the provider, empty until payment starts
    pub payment_reference: String,
    pub payment_expiration_time: DateTime<Utc>,
    /// Later used to authorize a review of the stay
    pub reference_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Build a fresh PENDING booking
    pub fn pending(
        user_id: Uuid,
        property_id: Uuid,
        dates: DateRange,
        payment_expiration_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            property_id: Some(property_id),
            date_from: dates.start(),
            date_to: dates.end(),
            status: BookingStatus::Pending,
            payment_reference: String::new(),
            payment_expiration_time,
            reference_code: generate_reference_code(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dates(&self) -> DateRange {
        DateRange {
            from: self.date_from,
            to: self.date_to,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn payment_window_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.payment_expiration_time
    }

    /// Whether this booking still blocks its dates on the property
    pub fn holds_dates(&self) -> bool {
        self.status != BookingStatus::Canceled
    }
}

/// Booking lifecycle states
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending, // Created, awaiting payment
    Paid,
    Canceled, // Terminal
}

impl BookingStatus {
    /// `PENDING -> PAID -> CANCELED`; deletion of PENDING bookings is not a status.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Paid)
                | (BookingStatus::Paid, BookingStatus::Canceled)
        )
    }
}

/// Half-open stay interval `[from, to)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, BookingError> {
        if from >= to {
            return Err(BookingError::InvalidDateRange);
        }
        Ok(Self { from, to })
    }

    pub fn start(&self) -> NaiveDate {
        self.from
    }

    pub fn end(&self) -> NaiveDate {
        self.to
    }

    pub fn nights(&self) -> i64 {
        (self.to - self.from).num_days()
    }

    pub fn starts_before(&self, day: NaiveDate) -> bool {
        self.from < day || self.to < day
    }

    /// `[a, b)` and `[c, d)` overlap iff `a < d && c < b`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.from < other.to && other.from < self.to
    }
}

pub fn generate_reference_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERENCE_CODE_LEN)
        .map(|_| REFERENCE_CODE_CHARSET[rng.gen_range(0..REFERENCE_CODE_CHARSET.len())] as char)
        .collect()
}

/// Request DTO for creating a booking
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub property_id: Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
}

/// How the provider should capture the charge
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMethod {
    #[default]
    Automatic,
    Manual,
}

impl CaptureMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureMethod::Automatic => "automatic",
            CaptureMethod::Manual => "manual",
        }
    }
}

/// Request DTO for starting a payment
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PayBookingRequest {
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub capture_method: Option<CaptureMethod>,
}

impl PayBookingRequest {
    pub const DEFAULT_CURRENCY: &'static str = "usd";

    pub fn currency(&self) -> String {
        self.currency
            .as_deref()
            .unwrap_or(Self::DEFAULT_CURRENCY)
            .to_lowercase()
    }

    pub fn capture_method(&self) -> CaptureMethod {
        self.capture_method.unwrap_or_default()
    }
}

/// Response DTO for a started payment
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentSession {
    pub booking_id: Uuid,
    pub payment_reference: String,
    /// Handed to the client-side payment form
    pub client_secret: String,
}

/// Result of applying a payment confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyPaid,
    /// Booking was canceled before the confirmation arrived
    Ignored,
}

/// Admin query filters for listing bookings
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    /// Bookings starting on or after this day
    pub date_from: Option<NaiveDate>,
    /// Bookings ending on or before this day
    pub date_to: Option<NaiveDate>,
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub price_gte: Option<Decimal>,
    pub price_lte: Option<Decimal>,
}

impl BookingFilter {
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }
}

/// Sortable booking columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    DateFrom,
    DateTo,
    Status,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::DateFrom => "date_from",
            SortField::DateTo => "date_to",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

/// Resolved page window plus ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
    pub order_by: Vec<SortKey>,
}

impl PageRequest {
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, page_size: Option<u32>, default_page_size: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(default_page_size)
                .clamp(1, Self::MAX_PAGE_SIZE),
            order_by: Vec::new(),
        }
    }

    /// Parse `order_by` like `-date_from,status`
    pub fn with_order(mut self, order_by: Option<&str>) -> Result<Self, BookingError> {
        let Some(raw) = order_by else {
            return Ok(self);
        };
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (descending, name) = match part.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, part),
            };
            let field = match name {
                "created_at" | "created" => SortField::CreatedAt,
                "date_from" => SortField::DateFrom,
                "date_to" => SortField::DateTo,
                "status" => SortField::Status,
                other => {
                    return Err(BookingError::InvalidQuery(format!(
                        "cannot order by '{}'",
                        other
                    )))
                }
            };
            self.order_by.push(SortKey { field, descending });
        }
        Ok(self)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Explicit ordering, or newest first
    pub fn sort_keys(&self) -> Vec<SortKey> {
        if self.order_by.is_empty() {
            vec![SortKey {
                field: SortField::CreatedAt,
                descending: true,
            }]
        } else {
            self.order_by.clone()
        }
    }
}
