mod common;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use common::{money, stay, world, FakeGateway, World};
use stayease_core::adapters::InMemoryStore;
use stayease_core::domain::{
    Booking, BookingStatus, GuestInfo, Payment, PaymentMethod, PaymentStatus,
};
use stayease_core::error::CoreError;
use stayease_core::ports::{GatewayError, PaymentRepository, RepositoryError, RepositoryResult};
use stayease_core::services::{NewBooking, PaymentService};

/// Payment store that holds back FAILED writes, so a concurrent completion
/// reaches storage first.
struct SlowFailures {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl PaymentRepository for SlowFailures {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment> {
        self.inner.insert(payment).await
    }

    async fn get_by_order_id(&self, gateway_order_id: &str) -> RepositoryResult<Payment> {
        self.inner.get_by_order_id(gateway_order_id).await
    }

    async fn latest_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Option<Payment>> {
        self.inner.latest_for_booking(booking_id).await
    }

    async fn update(&self, payment: &Payment) -> RepositoryResult<Payment> {
        if payment.status == PaymentStatus::Failed {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.update(payment).await
    }
}

async fn pending(world: &World, user_id: i64, check_in: &str, check_out: &str) -> Booking {
    world
        .bookings
        .create(
            user_id,
            NewBooking {
                hotel_id: world.hotel.id,
                room_id: world.room.id,
                stay: stay(check_in, check_out),
                guests: 2,
                guest: GuestInfo::default(),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_pay_and_confirm_end_to_end() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    assert_eq!(booking.total_amount, money("5000.00"));

    let initiated = world.payments.initiate(booking.id).await.unwrap();
    assert_eq!(initiated.order.amount_minor, 500_000);
    assert_eq!(initiated.order.currency, "INR");
    assert_eq!(initiated.payment.status, PaymentStatus::Pending);
    assert_eq!(initiated.payment.amount, booking.total_amount);
    assert_eq!(
        initiated.payment.gateway_order_id.as_deref(),
        Some(initiated.order.id.as_str())
    );
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );

    let signature = FakeGateway::sign(&initiated.order.id, "pay_001");
    let payment = world
        .payments
        .confirm(&initiated.order.id, "pay_001", &signature)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_001"));

    let booking = world.bookings.get_by_id(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let free = world
        .availability
        .search(world.hotel.id, &stay("2025-01-10", "2025-01-12"), None)
        .await
        .unwrap();
    assert!(free.iter().all(|r| r.id != world.room.id));
    assert!(free.iter().any(|r| r.id == world.suite.id));
}

#[tokio::test]
async fn test_bad_signature_fails_payment_and_keeps_booking_pending() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let initiated = world.payments.initiate(booking.id).await.unwrap();

    let err = world
        .payments
        .confirm(&initiated.order.id, "pay_001", "sig_forged")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::VerificationFailed(ref order) if *order == initiated.order.id
    ));

    let latest = world.payments.status_for(booking.id).await.unwrap().unwrap();
    assert_eq!(latest.status, PaymentStatus::Failed);
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );

    // The guest can retry the same order with a genuine callback.
    let signature = FakeGateway::sign(&initiated.order.id, "pay_002");
    let payment = world
        .payments
        .confirm(&initiated.order.id, "pay_002", &signature)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn test_gateway_failure_records_no_payment() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    world.gateway.fail_orders(true);

    let err = world.payments.initiate(booking.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Gateway(GatewayError::Request(_))));

    assert!(world.store.payments_for_booking(booking.id).await.is_empty());
    assert!(world.payments.status_for(booking.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_initiate_unknown_booking_is_not_found() {
    let world = world(false).await;
    let err = world.payments.initiate(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
    assert_eq!(world.gateway.orders_created(), 0);
}

#[tokio::test]
async fn test_initiate_rejects_cancelled_booking() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    world.bookings.cancel(world.guest.id, booking.id).await.unwrap();

    let err = world.payments.initiate(booking.id).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            from: BookingStatus::Cancelled,
            ..
        }
    ));
    assert_eq!(world.gateway.orders_created(), 0);
}

#[tokio::test]
async fn test_confirm_unknown_order_is_not_found() {
    let world = world(false).await;
    let err = world
        .payments
        .confirm("order_missing", "pay_001", "sig")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_repeated_confirm_returns_completed_payment() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let initiated = world.payments.initiate(booking.id).await.unwrap();
    let signature = FakeGateway::sign(&initiated.order.id, "pay_001");

    let first = world
        .payments
        .confirm(&initiated.order.id, "pay_001", &signature)
        .await
        .unwrap();
    let again = world
        .payments
        .confirm(&initiated.order.id, "pay_001", &signature)
        .await
        .unwrap();
    assert_eq!(first, again);
}

#[tokio::test]
async fn test_retried_initiate_reports_latest_attempt() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;

    let first = world.payments.initiate(booking.id).await.unwrap();
    let second = world.payments.initiate(booking.id).await.unwrap();
    assert_ne!(first.order.id, second.order.id);

    let latest = world.payments.status_for(booking.id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.payment.id);
    assert_eq!(world.store.payments_for_booking(booking.id).await.len(), 2);
}

#[tokio::test]
async fn test_second_payment_for_same_dates_is_rejected() {
    let world = world(false).await;
    let first = pending(&world, world.guest.id, "2025-02-01", "2025-02-05").await;
    let second = pending(&world, world.other_guest.id, "2025-02-03", "2025-02-04").await;

    let first_order = world.payments.initiate(first.id).await.unwrap().order;
    let second_order = world.payments.initiate(second.id).await.unwrap().order;

    world
        .payments
        .confirm(&first_order.id, "pay_1", &FakeGateway::sign(&first_order.id, "pay_1"))
        .await
        .unwrap();

    let err = world
        .payments
        .confirm(&second_order.id, "pay_2", &FakeGateway::sign(&second_order.id, "pay_2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict { existing: Some(id), .. } if id == first.id));

    let failed = world.payments.status_for(second.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(
        world.bookings.get_by_id(second.id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_mock_completion_is_disabled_by_default() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;

    let err = world.payments.mock_complete(booking.id).await.unwrap_err();
    assert!(matches!(err, CoreError::MockPaymentsDisabled));
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
}

#[tokio::test]
async fn test_mock_completion_confirms_booking() {
    let world = world(true).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;

    let payment = world.payments.mock_complete(booking.id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.method, PaymentMethod::Mock);
    assert_eq!(payment.amount, booking.total_amount);
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );

    // A second call hands back the same completed payment.
    let again = world.payments.mock_complete(booking.id).await.unwrap();
    assert_eq!(again.id, payment.id);
    assert_eq!(world.store.payments_for_booking(booking.id).await.len(), 1);
}

#[tokio::test]
async fn test_mock_completion_reuses_pending_payment() {
    let world = world(true).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let initiated = world.payments.initiate(booking.id).await.unwrap();

    let payment = world.payments.mock_complete(booking.id).await.unwrap();
    assert_eq!(payment.id, initiated.payment.id);
    assert_eq!(payment.method, PaymentMethod::Razorpay);
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(world.store.payments_for_booking(booking.id).await.len(), 1);
}

#[tokio::test]
async fn test_initiate_rejects_confirmed_booking() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let order = world.payments.initiate(booking.id).await.unwrap().order;
    world
        .payments
        .confirm(&order.id, "pay_001", &FakeGateway::sign(&order.id, "pay_001"))
        .await
        .unwrap();

    let err = world.payments.initiate(booking.id).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            from: BookingStatus::Confirmed,
            ..
        }
    ));
    assert_eq!(world.gateway.orders_created(), 1);
    assert_eq!(world.store.payments_for_booking(booking.id).await.len(), 1);
}

#[tokio::test]
async fn test_second_paid_order_still_completes() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let first = world.payments.initiate(booking.id).await.unwrap().order;
    let second = world.payments.initiate(booking.id).await.unwrap().order;

    for (order, payment_id) in [(&first, "pay_1"), (&second, "pay_2")] {
        let signature = FakeGateway::sign(&order.id, payment_id);
        let payment = world
            .payments
            .confirm(&order.id, payment_id, &signature)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
    }

    // Both captures are recorded; the second one is flagged for a refund.
    let payments = world.store.payments_for_booking(booking.id).await;
    assert_eq!(payments.len(), 2);
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Completed));
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn test_callback_after_cancel_fails_payment_and_keeps_booking_cancelled() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let order = world.payments.initiate(booking.id).await.unwrap().order;

    world.bookings.cancel(world.guest.id, booking.id).await.unwrap();

    let signature = FakeGateway::sign(&order.id, "pay_001");
    let err = world
        .payments
        .confirm(&order.id, "pay_001", &signature)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidTransition {
            from: BookingStatus::Cancelled,
            to: BookingStatus::Confirmed,
        }
    ));

    let payment = world.payments.status_for(booking.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.gateway_payment_id.as_deref(), Some("pay_001"));
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Cancelled
    );

    // The room is free again for anyone else.
    let free = world
        .availability
        .search(world.hotel.id, &stay("2025-01-10", "2025-01-12"), None)
        .await
        .unwrap();
    assert!(free.iter().any(|r| r.id == world.room.id));
}

#[tokio::test]
async fn test_late_failure_cannot_overwrite_completed_payment() {
    let world = world(false).await;
    let payments = PaymentService::new(
        world.bookings.clone(),
        Arc::new(SlowFailures {
            inner: world.store.clone(),
        }),
        world.gateway.clone(),
        "INR",
        false,
    );
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let order = payments.initiate(booking.id).await.unwrap().order;
    let genuine = FakeGateway::sign(&order.id, "pay_1");

    let (forged, paid) = tokio::join!(
        payments.confirm(&order.id, "pay_x", "sig_forged"),
        payments.confirm(&order.id, "pay_1", &genuine),
    );
    assert!(matches!(forged, Err(CoreError::VerificationFailed(_))));
    assert_eq!(paid.unwrap().status, PaymentStatus::Completed);

    let latest = payments.status_for(booking.id).await.unwrap().unwrap();
    assert_eq!(latest.status, PaymentStatus::Completed);
    assert_eq!(latest.gateway_payment_id.as_deref(), Some("pay_1"));
    assert_eq!(
        world.bookings.get_by_id(booking.id).await.unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn test_store_refuses_to_overwrite_settled_payment() {
    let world = world(false).await;
    let booking = pending(&world, world.guest.id, "2025-01-10", "2025-01-12").await;
    let initiated = world.payments.initiate(booking.id).await.unwrap();
    let order = &initiated.order.id;
    world
        .payments
        .confirm(order, "pay_1", &FakeGateway::sign(order, "pay_1"))
        .await
        .unwrap();

    let mut stale = initiated.payment.clone();
    stale.fail(Some("pay_x".to_string()), Utc::now());
    let err = world.store.update(&stale).await.unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::AlreadySettled(ref stored) if stored.status == PaymentStatus::Completed
    ));
}
