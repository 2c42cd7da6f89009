#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use stayease_core::adapters::InMemoryStore;
use stayease_core::domain::{Hotel, Room, StayDates, User};
use stayease_core::gateway::razorpay::to_minor_units;
use stayease_core::ports::{GatewayError, GatewayOrder, PaymentGateway};
use stayease_core::services::{AvailabilityService, BookingService, PaymentService};

/// Gateway double: sequential order ids, signatures of the form
/// `sig_<order>_<payment>`, and a switch to make order creation fail.
#[derive(Default)]
pub struct FakeGateway {
    orders: AtomicU32,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn sign(order_id: &str, payment_id: &str) -> String {
        format!("sig_{}_{}", order_id, payment_id)
    }

    pub fn fail_orders(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn orders_created(&self) -> u32 {
        self.orders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
        _receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("connection refused".to_string()));
        }
        let n = self.orders.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            id: format!("order_{}", n),
            amount_minor: to_minor_units(amount)?,
            currency: currency.to_string(),
        })
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        signature == Self::sign(gateway_order_id, gateway_payment_id)
    }
}

pub struct World {
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub availability: Arc<AvailabilityService>,
    pub guest: User,
    pub other_guest: User,
    pub hotel: Hotel,
    pub room: Room,
    pub suite: Room,
}

/// One hotel with a 2500.00/night double and a 6000.00/night suite.
pub async fn world(enable_mock_payments: bool) -> World {
    let store = InMemoryStore::new();
    let guest = store.add_user("asha", "asha@example.com").await;
    let other_guest = store.add_user("vikram", "vikram@example.com").await;
    let hotel = store.add_hotel("Lakeview Palace", "Udaipur").await;
    let room = store.add_room(hotel.id, "101", money("2500.00"), 2).await;
    let suite = store.add_room(hotel.id, "501", money("6000.00"), 4).await;

    let store = Arc::new(store);
    let gateway = Arc::new(FakeGateway::default());
    let bookings = Arc::new(BookingService::new(store.clone(), store.clone(), store.clone()));
    let payments = Arc::new(PaymentService::new(
        bookings.clone(),
        store.clone(),
        gateway.clone(),
        "INR",
        enable_mock_payments,
    ));
    let availability = Arc::new(AvailabilityService::new(store.clone(), store.clone()));

    World {
        store,
        gateway,
        bookings,
        payments,
        availability,
        guest,
        other_guest,
        hotel,
        room,
        suite,
    }
}

pub fn money(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::from_str(raw).unwrap()
}

pub fn stay(check_in: &str, check_out: &str) -> StayDates {
    StayDates::new(date(check_in), date(check_out)).unwrap()
}
