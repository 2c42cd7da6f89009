//! In-process store implementing every repository port.
//! A single async mutex guards all state, so each port call is atomic.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    overlap, Booking, BookingStatus, Hotel, Payment, Room, StayDates, Transition, User,
};
use crate::ports::{
    BookingFilter, BookingRepository, CatalogStore, PaymentRepository, RepositoryError,
    RepositoryResult, UserDirectory,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<i64, User>,
    hotels: HashMap<i64, Hotel>,
    rooms: BTreeMap<i64, Room>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
    next_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn booking_index(&self, id: Uuid) -> RepositoryResult<usize> {
        self.bookings
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("booking {}", id)))
    }

    fn confirmed_for_room(&self, room_id: i64) -> Vec<Booking> {
        self.bookings
            .iter()
            .filter(|b| b.room_id == room_id && b.status.is_blocking())
            .cloned()
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, username: &str, email: &str) -> User {
        let mut state = self.state.lock().await;
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            email: email.to_string(),
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_hotel(&self, name: &str, city: &str) -> Hotel {
        let mut state = self.state.lock().await;
        let hotel = Hotel {
            id: state.next_id(),
            name: name.to_string(),
            city: city.to_string(),
            address: None,
        };
        state.hotels.insert(hotel.id, hotel.clone());
        hotel
    }

    pub async fn add_room(
        &self,
        hotel_id: i64,
        room_number: &str,
        price_per_night: BigDecimal,
        capacity: i32,
    ) -> Room {
        let mut state = self.state.lock().await;
        let room = Room {
            id: state.next_id(),
            hotel_id,
            room_number: room_number.to_string(),
            room_type: "Standard".to_string(),
            price_per_night,
            capacity,
            available: true,
        };
        state.rooms.insert(room.id, room.clone());
        room
    }

    /// Catalog edit; existing bookings keep their snapshotted totals.
    pub async fn set_room_price(&self, room_id: i64, price_per_night: BigDecimal) {
        let mut state = self.state.lock().await;
        if let Some(room) = state.rooms.get_mut(&room_id) {
            room.price_per_night = price_per_night;
        }
    }

    pub async fn payments_for_booking(&self, booking_id: Uuid) -> Vec<Payment> {
        let state = self.state.lock().await;
        state
            .payments
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_if_available(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(&booking.room_id) {
            return Err(RepositoryError::NotFound(format!("room {}", booking.room_id)));
        }
        if let Some(existing) =
            overlap::find_conflict(booking.room_id, &booking.stay, &state.bookings)
        {
            return Err(RepositoryError::Conflict(Some(Box::new(existing.clone()))));
        }
        state.bookings.push(booking.clone());
        Ok(booking.clone())
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Booking> {
        let state = self.state.lock().await;
        let idx = state.booking_index(id)?;
        Ok(state.bookings[idx].clone())
    }

    async fn list_for_user(&self, user_id: i64) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .bookings
            .iter()
            .rev()
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .filter(|b| filter.hotel_id.map_or(true, |h| b.hotel_id == h))
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn blocking_for_room(
        &self,
        room_id: i64,
        stay: &StayDates,
    ) -> RepositoryResult<Vec<Booking>> {
        let state = self.state.lock().await;
        Ok(state
            .confirmed_for_room(room_id)
            .into_iter()
            .filter(|b| b.stay.overlaps(stay))
            .collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Booking, Transition)> {
        let mut state = self.state.lock().await;
        let idx = state.booking_index(id)?;
        let room_bookings = state.confirmed_for_room(state.bookings[idx].room_id);

        let booking = &mut state.bookings[idx];
        let outcome = booking.transition_to(target, &room_bookings, now)?;
        Ok((booking.clone(), outcome))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let mut state = self.state.lock().await;
        state.payments.push(payment.clone());
        Ok(payment.clone())
    }

    async fn get_by_order_id(&self, gateway_order_id: &str) -> RepositoryResult<Payment> {
        let state = self.state.lock().await;
        state
            .payments
            .iter()
            .find(|p| p.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned()
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("payment for order {}", gateway_order_id))
            })
    }

    async fn latest_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .iter()
            .rev()
            .find(|p| p.booking_id == booking_id)
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let mut state = self.state.lock().await;
        let slot = state
            .payments
            .iter_mut()
            .find(|p| p.id == payment.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", payment.id)))?;
        if slot.is_settled() {
            return Err(RepositoryError::AlreadySettled(Box::new(slot.clone())));
        }
        *slot = payment.clone();
        Ok(payment.clone())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_hotel(&self, id: i64) -> RepositoryResult<Hotel> {
        let state = self.state.lock().await;
        state
            .hotels
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("hotel {}", id)))
    }

    async fn find_room(&self, id: i64) -> RepositoryResult<Room> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("room {}", id)))
    }

    async fn rooms_for_hotel(&self, hotel_id: i64) -> RepositoryResult<Vec<Room>> {
        let state = self.state.lock().await;
        Ok(state
            .rooms
            .values()
            .filter(|r| r.hotel_id == hotel_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: i64) -> RepositoryResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }
}
