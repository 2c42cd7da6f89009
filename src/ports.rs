//! Ports consumed by the booking services.
//! Adapters live in `crate::adapters` and `crate::gateway`.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingStatus, Hotel, Payment, Room, StayDates, Transition, TransitionError, User,
};

/// Postgres `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    /// `None` when the store detected the overlap without loading the holder.
    #[error("room is already confirmed for the requested dates")]
    Conflict(Option<Box<Booking>>),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// The stored payment is COMPLETED or REFUNDED and was left untouched.
    #[error("payment {} is already {}", .0.id, .0.status)]
    AlreadySettled(Box<Payment>),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("record".to_string()),
            sqlx::Error::Database(ref db)
                if db.code().as_deref() == Some(EXCLUSION_VIOLATION) =>
            {
                RepositoryError::Conflict(None)
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

impl From<TransitionError> for RepositoryError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotAllowed { from, to } => {
                RepositoryError::InvalidTransition { from, to }
            }
            TransitionError::Conflict(existing) => RepositoryError::Conflict(Some(existing)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub hotel_id: Option<i64>,
    pub limit: i64,
}

impl Default for BookingFilter {
    fn default() -> Self {
        Self {
            status: None,
            hotel_id: None,
            limit: 100,
        }
    }
}

/// Booking persistence. Every write that can change which bookings hold a
/// room must be serialized per room by the implementation.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts `booking` unless a confirmed booking for the same room overlaps
    /// its stay. The check and the insert are one atomic step.
    async fn insert_if_available(&self, booking: &Booking) -> RepositoryResult<Booking>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Booking>;

    /// Insertion order.
    async fn list_for_user(&self, user_id: i64) -> RepositoryResult<Vec<Booking>>;

    /// Most recent first.
    async fn list(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>>;

    /// Confirmed bookings of `room_id` whose stay may intersect `stay`.
    /// May return a superset; callers run the overlap rule themselves.
    async fn blocking_for_room(
        &self,
        room_id: i64,
        stay: &StayDates,
    ) -> RepositoryResult<Vec<Booking>>;

    /// Applies `Booking::transition_to` under the room's write lock.
    async fn transition(
        &self,
        id: Uuid,
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Booking, Transition)>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment>;

    async fn get_by_order_id(&self, gateway_order_id: &str) -> RepositoryResult<Payment>;

    async fn latest_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Option<Payment>>;

    /// Persists status, gateway references and `updated_at`, unless the stored
    /// row is already settled. A settled row is returned as `AlreadySettled`
    /// and is never overwritten.
    async fn update(&self, payment: &Payment) -> RepositoryResult<Payment>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_hotel(&self, id: i64) -> RepositoryResult<Hotel>;

    async fn find_room(&self, id: i64) -> RepositoryResult<Room>;

    async fn rooms_for_hotel(&self, hotel_id: i64) -> RepositoryResult<Vec<Room>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: i64) -> RepositoryResult<User>;
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment gateway request failed: {0}")]
    Request(String),
    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid response from payment gateway: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Order as acknowledged by the gateway. `amount_minor` is in the currency's
/// smallest unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool;
}
