//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use lodging_booking_server::booking::{Booking, BookingService, CreateBookingRequest};
use lodging_booking_server::models::{PaymentProfile, Property, PropertyType, User, UserRole};
use lodging_booking_server::notifications::{Notifier, NotifyError, OutgoingEmail};
use lodging_booking_server::payments::{
    GatewayError, PaymentGateway, PaymentIntent, PaymentIntentRequest, PaymentProfileService,
    Refund, RefundRequest,
};
use lodging_booking_server::store::{AccountStore, InMemoryStore};
use lodging_booking_server::tasks::{TaskQueue, TaskWorker};

pub const FROM_EMAIL: &str = "bookings@example.com";

/// Payment provider double that records every call
#[derive(Default)]
pub struct FakeGateway {
    pub customers: Mutex<Vec<String>>,
    pub intents: Mutex<Vec<PaymentIntentRequest>>,
    pub refunds: Mutex<Vec<RefundRequest>>,
    pub reject_intents: bool,
    pub reject_refunds: bool,
    /// Suspend inside `create_refund` so concurrent callers interleave
    pub yield_on_refund: bool,
}

impl FakeGateway {
    pub fn rejecting() -> Self {
        Self {
            reject_intents: true,
            ..Self::default()
        }
    }

    pub fn rejecting_refunds() -> Self {
        Self {
            reject_refunds: true,
            ..Self::default()
        }
    }

    pub fn yielding() -> Self {
        Self {
            yield_on_refund: true,
            ..Self::default()
        }
    }

    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(&self, email: &str) -> Result<String, GatewayError> {
        let mut customers = self.customers.lock().unwrap();
        customers.push(email.to_string());
        Ok(format!("cus_{}", customers.len()))
    }

    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError> {
        if self.reject_intents {
            return Err(GatewayError::Rejected("Your card was declined.".to_string()));
        }
        let mut intents = self.intents.lock().unwrap();
        intents.push(request);
        let n = intents.len();
        Ok(PaymentIntent {
            id: format!("pi_{}", n),
            client_secret: format!("pi_{}_secret", n),
        })
    }

    async fn create_refund(&self, request: RefundRequest) -> Result<Refund, GatewayError> {
        if self.yield_on_refund {
            tokio::task::yield_now().await;
        }
        if self.reject_refunds {
            return Err(GatewayError::Rejected("Charge has already been refunded.".to_string()));
        }
        let mut refunds = self.refunds.lock().unwrap();
        refunds.push(request);
        Ok(Refund {
            id: format!("re_{}", refunds.len()),
            status: Some("succeeded".to_string()),
        })
    }
}

/// Notifier double that keeps delivered emails, or fails every delivery
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub attempts: Mutex<usize>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail {
            return Err(NotifyError::Delivery("relay unreachable".to_string()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub fn user(email: &str, role: UserRole) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        role,
        created_at: Utc::now(),
    }
}

pub fn property(owner_id: Uuid, price: Decimal) -> Property {
    Property {
        id: Uuid::new_v4(),
        owner_id,
        name: "Lake House".to_string(),
        property_type: PropertyType::Home,
        city: "Krakow".to_string(),
        street: "Main 1".to_string(),
        zip_code: "30-001".to_string(),
        capacity: 4,
        number_of_rooms: 2,
        price,
        created_at: Utc::now(),
    }
}

/// Today plus `offset` days
pub fn day(offset: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(offset)
}

pub fn stay(property_id: Uuid, from: i64, to: i64) -> CreateBookingRequest {
    CreateBookingRequest {
        property_id,
        date_from: day(from),
        date_to: day(to),
    }
}

/// A booking engine on the in-memory store with recording doubles
pub struct Harness {
    pub store: InMemoryStore,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: Arc<BookingService>,
    pub profiles: Arc<PaymentProfileService>,
    pub worker: TaskWorker,
    pub renter: User,
    pub owner: User,
    pub admin: User,
    pub property: Property,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(FakeGateway::default(), RecordingNotifier::default()).await
    }

    pub async fn with(gateway: FakeGateway, notifier: RecordingNotifier) -> Self {
        let store = InMemoryStore::new();
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(notifier);

        let renter = user("renter@example.com", UserRole::User);
        let owner = user("owner@example.com", UserRole::User);
        let admin = user("admin@example.com", UserRole::Admin);
        let property = property(owner.id, Decimal::new(12050, 2));
        for u in [&renter, &owner, &admin] {
            store.add_user(u.clone()).await;
        }
        store.add_property(property.clone()).await;

        let shared = Arc::new(store.clone());
        let (queue, receiver) = TaskQueue::new();
        let worker = TaskWorker::new(
            receiver,
            shared.clone(),
            shared.clone(),
            shared.clone(),
            notifier.clone(),
            FROM_EMAIL.to_string(),
        );
        let service = Arc::new(BookingService::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            gateway.clone(),
            queue,
            15,
        ));
        let profiles = Arc::new(PaymentProfileService::new(shared, gateway.clone()));

        Self {
            store,
            gateway,
            notifier,
            service,
            profiles,
            worker,
            renter,
            owner,
            admin,
            property,
        }
    }

    /// Give `user_id` a payment profile without going through the provider
    pub async fn register_payment_profile(&self, user_id: Uuid) {
        self.store
            .save_payment_profile(PaymentProfile {
                user_id,
                customer_id: format!("cus_{}", user_id.simple()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    /// Book days `from..to` for the renter
    pub async fn book(&self, from: i64, to: i64) -> Booking {
        self.service
            .create_booking(self.renter.id, stay(self.property.id, from, to))
            .await
            .unwrap()
    }

    /// Book, pay and confirm a stay for the renter
    pub async fn paid_booking(&mut self, from: i64, to: i64) -> Booking {
        self.register_payment_profile(self.renter.id).await;
        let booking = self.book(from, to).await;
        self.service
            .pay_booking(self.renter.id, booking.id, Default::default())
            .await
            .unwrap();
        self.service.confirm_payment(booking.id).await.unwrap();
        self.worker.drain().await;
        self.service.get_booking(booking.id).await.unwrap()
    }

    /// Rewind the payment window of a stored booking into the past
    pub async fn expire(&self, booking: &Booking) {
        let mut expired = booking.clone();
        expired.payment_expiration_time = Utc::now() - Duration::minutes(1);
        self.store.put_booking(expired).await;
    }
}
