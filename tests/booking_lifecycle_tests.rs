//! Booking lifecycle tests against the in-memory store

mod common;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{day, stay, FakeGateway, Harness, RecordingNotifier, FROM_EMAIL};
use lodging_booking_server::booking::{
    BookingError, BookingFilter, BookingStatus, ConfirmOutcome, PageRequest, PayBookingRequest,
};
use lodging_booking_server::store::BookingStore;

// ===== Creation =====

#[tokio::test]
async fn test_create_booking_is_pending_with_payment_window() {
    let h = Harness::new().await;
    let before = Utc::now();

    let booking = h.book(10, 15).await;

    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.user_id, h.renter.id);
    assert_eq!(booking.property_id, Some(h.property.id));
    assert_eq!(booking.reference_code.len(), 6);
    assert!(booking.payment_reference.is_empty());
    assert!(booking.payment_expiration_time >= before + chrono::Duration::minutes(15));
    assert!(booking.payment_expiration_time <= Utc::now() + chrono::Duration::minutes(15));
}

#[tokio::test]
async fn test_create_booking_rejects_inverted_and_empty_ranges() {
    let h = Harness::new().await;

    let inverted = h
        .service
        .create_booking(h.renter.id, stay(h.property.id, 5, 3))
        .await;
    assert!(matches!(inverted, Err(BookingError::InvalidDateRange)));

    let empty = h
        .service
        .create_booking(h.renter.id, stay(h.property.id, 5, 5))
        .await;
    assert!(matches!(empty, Err(BookingError::InvalidDateRange)));
}

#[tokio::test]
async fn test_create_booking_rejects_past_dates() {
    let h = Harness::new().await;

    let result = h
        .service
        .create_booking(h.renter.id, stay(h.property.id, -1, 3))
        .await;
    assert!(matches!(result, Err(BookingError::PastDate)));

    // Today is still bookable
    assert!(h
        .service
        .create_booking(h.renter.id, stay(h.property.id, 0, 1))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_create_booking_for_unknown_property() {
    let h = Harness::new().await;

    let result = h
        .service
        .create_booking(h.renter.id, stay(Uuid::new_v4(), 3, 5))
        .await;
    assert!(matches!(result, Err(BookingError::PropertyNotFound)));
}

#[tokio::test]
async fn test_overlapping_booking_is_unavailable() {
    let h = Harness::new().await;
    h.book(12, 20).await;

    let result = h
        .service
        .create_booking(h.renter.id, stay(h.property.id, 10, 15))
        .await;
    assert!(matches!(result, Err(BookingError::PropertyUnavailable)));

    // Fully contained and fully containing ranges overlap too
    for (from, to) in [(13, 14), (5, 25)] {
        let result = h
            .service
            .create_booking(h.renter.id, stay(h.property.id, from, to))
            .await;
        assert!(matches!(result, Err(BookingError::PropertyUnavailable)));
    }
}

#[tokio::test]
async fn test_adjacent_bookings_do_not_overlap() {
    let h = Harness::new().await;
    h.book(10, 15).await;

    // Checkout day is the next guest's check-in day
    h.book(15, 18).await;
    h.book(7, 10).await;
}

#[tokio::test]
async fn test_canceled_booking_frees_its_dates() {
    let mut h = Harness::new().await;
    let paid = h.paid_booking(12, 20).await;
    h.service.cancel_booking(h.renter.id, paid.id).await.unwrap();

    let rebooked = h
        .service
        .create_booking(h.owner.id, stay(h.property.id, 10, 15))
        .await
        .unwrap();
    assert_eq!(rebooked.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_same_dates_on_another_property_are_available() {
    let h = Harness::new().await;
    let other = common::property(h.owner.id, Decimal::new(9900, 2));
    h.store.add_property(other.clone()).await;

    h.book(10, 15).await;
    assert!(h
        .service
        .create_booking(h.renter.id, stay(other.id, 10, 15))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_concurrent_overlapping_requests_admit_one() {
    let h = Harness::new().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let request = stay(h.property.id, 30, 34);
        let renter = h.renter.id;
        handles.push(tokio::spawn(async move {
            service.create_booking(renter, request).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(BookingError::PropertyUnavailable) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(created, 1);
}

// ===== Payment =====

#[tokio::test]
async fn test_pay_booking_creates_intent_with_property_price() {
    let h = Harness::new().await;
    h.register_payment_profile(h.renter.id).await;
    let booking = h.book(10, 12).await;

    let session = h
        .service
        .pay_booking(
            h.renter.id,
            booking.id,
            PayBookingRequest {
                currency: Some("EUR".to_string()),
                capture_method: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(session.booking_id, booking.id);
    assert_eq!(session.payment_reference, "pi_1");
    assert_eq!(session.client_secret, "pi_1_secret");

    let intents = h.gateway.intents.lock().unwrap().clone();
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].amount, h.property.price);
    assert_eq!(intents[0].currency, "eur");
    assert_eq!(intents[0].capture_method, "automatic");
    assert_eq!(intents[0].receipt_email, h.renter.email);
    assert_eq!(
        intents[0].metadata.get("booking_id"),
        Some(&booking.id.to_string())
    );

    let stored = h.service.get_booking(booking.id).await.unwrap();
    assert_eq!(stored.payment_reference, "pi_1");
    assert_eq!(stored.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_pay_requires_payment_profile() {
    let h = Harness::new().await;
    let booking = h.book(10, 12).await;

    let result = h
        .service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::PaymentProfileMissing)));
    assert_eq!(h.gateway.intent_count(), 0);
}

#[tokio::test]
async fn test_pay_someone_elses_booking_is_forbidden() {
    let h = Harness::new().await;
    h.register_payment_profile(h.owner.id).await;
    let booking = h.book(10, 12).await;

    let result = h
        .service
        .pay_booking(h.owner.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::Forbidden)));
}

#[tokio::test]
async fn test_pay_unknown_booking() {
    let h = Harness::new().await;
    h.register_payment_profile(h.renter.id).await;

    let result = h
        .service
        .pay_booking(h.renter.id, Uuid::new_v4(), Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::BookingNotFound)));
}

#[tokio::test]
async fn test_pay_after_expiration_deletes_booking() {
    let mut h = Harness::new().await;
    h.register_payment_profile(h.renter.id).await;
    let booking = h.book(10, 12).await;
    h.expire(&booking).await;

    let result = h
        .service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::PaymentWindowExpired)));
    assert_eq!(h.gateway.intent_count(), 0);

    assert_eq!(h.worker.drain().await, 1);
    assert!(matches!(
        h.service.get_booking(booking.id).await,
        Err(BookingError::BookingNotFound)
    ));

    // A second deletion is a no-op
    assert!(!h.service.delete_booking(booking.id).await.unwrap());

    // The dates are free again
    h.book(10, 12).await;
}

#[tokio::test]
async fn test_paid_booking_cannot_be_paid_again() {
    let mut h = Harness::new().await;
    let booking = h.paid_booking(10, 12).await;
    h.expire(&booking).await;

    let result = h
        .service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::NotPayable)));

    // Never reaped once paid
    assert_eq!(h.worker.drain().await, 0);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
}

#[tokio::test]
async fn test_gateway_rejection_leaves_booking_untouched() {
    let h = Harness::with(FakeGateway::rejecting(), RecordingNotifier::default()).await;
    h.register_payment_profile(h.renter.id).await;
    let booking = h.book(10, 12).await;

    let result = h
        .service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::PaymentProvider(_))));

    let stored = h.service.get_booking(booking.id).await.unwrap();
    assert_eq!(stored, booking);
}

#[tokio::test]
async fn test_pay_when_property_was_removed() {
    let h = Harness::new().await;
    h.register_payment_profile(h.renter.id).await;
    let booking = h.book(10, 12).await;
    h.store.remove_property(h.property.id).await;

    let result = h
        .service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await;
    assert!(matches!(result, Err(BookingError::PropertyNotFound)));
}

#[tokio::test]
async fn test_confirmation_after_property_removal_is_ignored() {
    let mut h = Harness::new().await;
    h.register_payment_profile(h.renter.id).await;
    let booking = h.book(10, 12).await;
    h.service
        .pay_booking(h.renter.id, booking.id, Default::default())
        .await
        .unwrap();
    h.store.remove_property(h.property.id).await;

    let outcome = h.service.confirm_payment(booking.id).await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::Ignored);

    let stored = h.service.get_booking(booking.id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
    assert_eq!(stored.property_id, None);
    assert_eq!(h.worker.drain().await, 0);
}

// ===== Confirmation =====

#[tokio::test]
async fn test_confirm_payment_marks_paid_and_notifies_both_parties() {
    let mut h = Harness::new().await;
    let booking = h.book(10, 12).await;

    let outcome = h.service.confirm_payment(booking.id).await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::Confirmed);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );

    assert_eq!(h.worker.drain().await, 2);
    let sent = h.notifier.sent();
    let mut recipients: Vec<_> = sent.iter().map(|e| e.to.as_str()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["owner@example.com", "renter@example.com"]);
    assert!(sent.iter().all(|e| e.from == FROM_EMAIL));
}

#[tokio::test]
async fn test_duplicate_confirmation_is_idempotent() {
    let mut h = Harness::new().await;
    let booking = h.book(10, 12).await;

    let first = h.service.confirm_payment(booking.id).await.unwrap();
    let second = h.service.confirm_payment(booking.id).await.unwrap();
    assert_eq!(first, ConfirmOutcome::Confirmed);
    assert_eq!(second, ConfirmOutcome::AlreadyPaid);

    h.worker.drain().await;
    assert_eq!(h.notifier.sent().len(), 2);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
}

#[tokio::test]
async fn test_concurrent_confirmations_converge() {
    let mut h = Harness::new().await;
    let booking = h.book(10, 12).await;

    let a = h.service.clone();
    let b = h.service.clone();
    let (first, second) = tokio::join!(a.confirm_payment(booking.id), b.confirm_payment(booking.id));

    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|o| *o == ConfirmOutcome::AlreadyPaid);
    assert_eq!(
        outcomes,
        vec![ConfirmOutcome::Confirmed, ConfirmOutcome::AlreadyPaid]
    );

    h.worker.drain().await;
    assert_eq!(h.notifier.sent().len(), 2);
}

#[tokio::test]
async fn test_confirmation_for_canceled_booking_is_ignored() {
    let mut h = Harness::new().await;
    let booking = h.paid_booking(10, 12).await;
    h.service.cancel_booking(h.renter.id, booking.id).await.unwrap();
    h.worker.drain().await;
    let delivered = h.notifier.sent().len();

    let outcome = h.service.confirm_payment(booking.id).await.unwrap();
    assert_eq!(outcome, ConfirmOutcome::Ignored);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Canceled
    );
    assert_eq!(h.worker.drain().await, 0);
    assert_eq!(h.notifier.sent().len(), delivered);
}

#[tokio::test]
async fn test_confirmation_for_unknown_booking() {
    let h = Harness::new().await;
    let result = h.service.confirm_payment(Uuid::new_v4()).await;
    assert!(matches!(result, Err(BookingError::BookingNotFound)));
}

#[tokio::test]
async fn test_failing_notifier_does_not_affect_booking() {
    let mut h = Harness::with(FakeGateway::default(), RecordingNotifier::failing()).await;
    let booking = h.book(10, 12).await;

    h.service.confirm_payment(booking.id).await.unwrap();
    assert_eq!(h.worker.drain().await, 2);

    // One attempt per notification, never retried
    assert_eq!(h.notifier.attempts(), 2);
    assert_eq!(h.worker.drain().await, 0);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
}

// ===== Cancellation =====

#[tokio::test]
async fn test_cancel_pending_booking_is_rejected() {
    let h = Harness::new().await;
    let booking = h.book(10, 12).await;

    let result = h.service.cancel_booking(h.renter.id, booking.id).await;
    assert!(matches!(result, Err(BookingError::CannotCancel)));
    assert_eq!(h.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_cancel_paid_booking_refunds_property_price_once() {
    let mut h = Harness::new().await;
    let booking = h.paid_booking(10, 12).await;
    let notified_before = h.notifier.sent().len();

    let canceled = h.service.cancel_booking(h.renter.id, booking.id).await.unwrap();
    assert_eq!(canceled.status, BookingStatus::Canceled);

    let refunds = h.gateway.refunds.lock().unwrap().clone();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount, h.property.price);
    assert_eq!(refunds[0].payment_intent_id, booking.payment_reference);
    assert_eq!(
        refunds[0].metadata.get("booking_id"),
        Some(&booking.id.to_string())
    );

    assert_eq!(h.worker.drain().await, 2);
    let sent = h.notifier.sent();
    let cancellations = &sent[notified_before..];
    assert_eq!(cancellations.len(), 2);
    assert!(cancellations.iter().all(|e| e.subject.contains("canceled")));

    // Canceled is terminal
    let again = h.service.cancel_booking(h.renter.id, booking.id).await;
    assert!(matches!(again, Err(BookingError::CannotCancel)));
    assert_eq!(h.gateway.refund_count(), 1);
}

#[tokio::test]
async fn test_concurrent_cancels_refund_once() {
    let mut h = Harness::with(FakeGateway::yielding(), RecordingNotifier::default()).await;
    let booking = h.paid_booking(10, 12).await;

    let (first, second) = tokio::join!(
        h.service.cancel_booking(h.renter.id, booking.id),
        h.service.cancel_booking(h.renter.id, booking.id)
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(BookingError::CannotCancel))));

    assert_eq!(h.gateway.refund_count(), 1);
    let refunds = h.gateway.refunds.lock().unwrap().clone();
    assert_eq!(refunds[0].idempotency_key, format!("refund-{}", booking.id));
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Canceled
    );
}

#[tokio::test]
async fn test_failed_refund_keeps_booking_paid() {
    let mut h = Harness::with(FakeGateway::rejecting_refunds(), RecordingNotifier::default()).await;
    let booking = h.paid_booking(10, 12).await;
    let notified_before = h.notifier.sent().len();

    let result = h.service.cancel_booking(h.renter.id, booking.id).await;
    assert!(matches!(result, Err(BookingError::PaymentProvider(_))));

    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
    assert_eq!(h.worker.drain().await, 0);
    assert_eq!(h.notifier.sent().len(), notified_before);
}

#[tokio::test]
async fn test_cancel_someone_elses_booking_is_forbidden() {
    let mut h = Harness::new().await;
    let booking = h.paid_booking(10, 12).await;

    let result = h.service.cancel_booking(h.owner.id, booking.id).await;
    assert!(matches!(result, Err(BookingError::Forbidden)));
    assert_eq!(h.gateway.refund_count(), 0);
}

#[tokio::test]
async fn test_cancel_when_property_was_removed() {
    let mut h = Harness::new().await;
    let booking = h.paid_booking(10, 12).await;
    h.store.remove_property(h.property.id).await;

    let result = h.service.cancel_booking(h.renter.id, booking.id).await;
    assert!(matches!(result, Err(BookingError::PropertyNotFound)));
    assert_eq!(h.gateway.refund_count(), 0);
    assert_eq!(
        h.service.get_booking(booking.id).await.unwrap().status,
        BookingStatus::Paid
    );
}

// ===== Expiration sweep =====

#[tokio::test]
async fn test_sweep_removes_only_expired_pending_bookings() {
    let mut h = Harness::new().await;
    let expired = h.book(10, 12).await;
    let fresh = h.book(20, 22).await;
    let paid = h.paid_booking(30, 32).await;
    h.expire(&expired).await;
    h.expire(&paid).await;

    let removed = h.service.sweep_expired().await.unwrap();
    assert_eq!(removed, vec![expired.id]);

    assert!(h.service.get_booking(fresh.id).await.is_ok());
    assert!(h.service.get_booking(paid.id).await.is_ok());
    assert!(h.service.sweep_expired().await.unwrap().is_empty());
}

// ===== Payment profiles =====

#[tokio::test]
async fn test_payment_profile_is_created_once() {
    let h = Harness::new().await;

    let first = h.profiles.ensure_profile(h.renter.id).await.unwrap();
    let second = h.profiles.ensure_profile(h.renter.id).await.unwrap();

    assert_eq!(first.customer_id, second.customer_id);
    assert_eq!(
        *h.gateway.customers.lock().unwrap(),
        vec![h.renter.email.clone()]
    );
}

#[tokio::test]
async fn test_payment_profile_for_unknown_user() {
    let h = Harness::new().await;
    let result = h.profiles.ensure_profile(Uuid::new_v4()).await;
    assert!(matches!(result, Err(BookingError::UserNotFound)));
}

// ===== Listing =====

#[tokio::test]
async fn test_user_listing_only_shows_own_bookings() {
    let h = Harness::new().await;
    h.book(10, 12).await;
    h.book(12, 14).await;
    h.service
        .create_booking(h.owner.id, stay(h.property.id, 20, 22))
        .await
        .unwrap();

    let page = h
        .service
        .list_user_bookings(h.renter.id, PageRequest::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page.data.iter().all(|b| b.user_id == h.renter.id));
}

#[tokio::test]
async fn test_admin_listing_filters_sorts_and_paginates() {
    let mut h = Harness::new().await;
    let paid = h.paid_booking(10, 12).await;
    h.book(20, 22).await;
    h.book(30, 32).await;

    let filter = BookingFilter {
        status: Some(BookingStatus::Pending),
        city: Some("krak".to_string()),
        ..Default::default()
    };
    let page = PageRequest::new(Some(1), Some(1), 20)
        .with_order(Some("-date_from"))
        .unwrap();
    let result = h.service.list_bookings(filter, page).await.unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0].date_from, day(30));

    let filter = BookingFilter {
        owner_id: Some(h.owner.id),
        date_to: Some(day(12)),
        ..Default::default()
    };
    let result = h
        .service
        .list_bookings(filter, PageRequest::new(None, None, 20))
        .await
        .unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0].id, paid.id);
}

#[tokio::test]
async fn test_store_level_deletion_is_idempotent() {
    let h = Harness::new().await;
    let booking = h.book(10, 12).await;

    assert!(h.store.delete_booking(booking.id).await.unwrap());
    assert!(!h.store.delete_booking(booking.id).await.unwrap());
}
