//! Postgres implementation of the repository ports.
//!
//! Booking writes lock the room row (`SELECT ... FOR UPDATE`) before reading
//! the room's confirmed bookings, so check-then-write is serialized per room.
//! The `bookings_no_double_confirm` exclusion constraint backs this up.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::{
    overlap, Booking, BookingStatus, GuestInfo, Hotel, Payment, Room, StayDates, Transition, User,
};
use crate::ports::{
    BookingFilter, BookingRepository, CatalogStore, PaymentRepository, RepositoryError,
    RepositoryResult, UserDirectory,
};

/// Postgres-backed store for bookings, payments and catalog lookups.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_room(conn: &mut PgConnection, room_id: i64) -> RepositoryResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| RepositoryError::NotFound(format!("room {}", room_id)))
}

async fn fetch_blocking(
    conn: &mut PgConnection,
    room_id: i64,
    stay: &StayDates,
) -> RepositoryResult<Vec<Booking>> {
    let rows = sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT * FROM bookings
        WHERE room_id = $1
          AND status = 'CONFIRMED'
          AND check_in < $3
          AND check_out > $2
        "#,
    )
    .bind(room_id)
    .bind(stay.check_in())
    .bind(stay.check_out())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(BookingRow::into_domain).collect()
}

#[async_trait]
impl BookingRepository for PostgresStore {
    async fn insert_if_available(&self, booking: &Booking) -> RepositoryResult<Booking> {
        let mut tx = self.pool.begin().await?;

        lock_room(&mut tx, booking.room_id).await?;
        let blocking = fetch_blocking(&mut tx, booking.room_id, &booking.stay).await?;
        if let Some(existing) = overlap::find_conflict(booking.room_id, &booking.stay, &blocking) {
            return Err(RepositoryError::Conflict(Some(Box::new(existing.clone()))));
        }

        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (
                id, user_id, hotel_id, room_id, check_in, check_out, guests, total_amount,
                status, guest_name, guest_email, guest_phone, special_requests,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.hotel_id)
        .bind(booking.room_id)
        .bind(booking.stay.check_in())
        .bind(booking.stay.check_out())
        .bind(booking.guests)
        .bind(&booking.total_amount)
        .bind(booking.status.as_str())
        .bind(&booking.guest.guest_name)
        .bind(&booking.guest.guest_email)
        .bind(&booking.guest.guest_phone)
        .bind(&booking.guest.special_requests)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("booking {}", id)))?
            .into_domain()
    }

    async fn list_for_user(&self, user_id: i64) -> RepositoryResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_domain).collect()
    }

    async fn list(&self, filter: &BookingFilter) -> RepositoryResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR hotel_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.hotel_id)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(BookingRow::into_domain).collect()
    }

    async fn blocking_for_room(
        &self,
        room_id: i64,
        stay: &StayDates,
    ) -> RepositoryResult<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        fetch_blocking(&mut conn, room_id, stay).await
    }

    async fn transition(
        &self,
        id: Uuid,
        target: BookingStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<(Booking, Transition)> {
        let mut tx = self.pool.begin().await?;

        let room_id = sqlx::query_scalar::<_, i64>("SELECT room_id FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("booking {}", id)))?;

        lock_room(&mut tx, room_id).await?;

        let mut booking =
            sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
                .into_domain()?;

        let blocking = if target.is_blocking() {
            fetch_blocking(&mut tx, room_id, &booking.stay).await?
        } else {
            Vec::new()
        };

        let outcome = booking.transition_to(target, &blocking, now)?;
        if let Transition::Applied { .. } = outcome {
            sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(booking.status.as_str())
                .bind(booking.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok((booking, outcome))
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            INSERT INTO payments (
                id, booking_id, amount, currency, method, status,
                gateway_order_id, gateway_payment_id, gateway_signature,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.gateway_order_id)
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_order_id(&self, gateway_order_id: &str) -> RepositoryResult<Payment> {
        let row =
            sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE gateway_order_id = $1")
                .bind(gateway_order_id)
                .fetch_optional(&self.pool)
                .await?;

        row.ok_or_else(|| {
            RepositoryError::NotFound(format!("payment for order {}", gateway_order_id))
        })?
        .into_domain()
    }

    async fn latest_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payments WHERE booking_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn update(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2, gateway_payment_id = $3, gateway_signature = $4, updated_at = $5
            WHERE id = $1 AND status NOT IN ('COMPLETED', 'REFUNDED')
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.status.as_str())
        .bind(&payment.gateway_payment_id)
        .bind(&payment.gateway_signature)
        .bind(payment.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return row.into_domain();
        }

        // Either the payment is gone or it settled since it was read.
        let stored = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE id = $1")
            .bind(payment.id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", payment.id)))?
            .into_domain()?;
        Err(RepositoryError::AlreadySettled(Box::new(stored)))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn find_hotel(&self, id: i64) -> RepositoryResult<Hotel> {
        sqlx::query_as::<_, HotelRow>("SELECT id, name, city, address FROM hotels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(HotelRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("hotel {}", id)))
    }

    async fn find_room(&self, id: i64) -> RepositoryResult<Room> {
        sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(RoomRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("room {}", id)))
    }

    async fn rooms_for_hotel(&self, hotel_id: i64) -> RepositoryResult<Vec<Room>> {
        let rows =
            sqlx::query_as::<_, RoomRow>("SELECT * FROM rooms WHERE hotel_id = $1 ORDER BY id")
                .bind(hotel_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(RoomRow::into_domain).collect())
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn find_user(&self, id: i64) -> RepositoryResult<User> {
        sqlx::query_as::<_, UserRow>("SELECT id, username, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_domain)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {}", id)))
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: i64,
    hotel_id: i64,
    room_id: i64,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: i32,
    total_amount: BigDecimal,
    status: String,
    guest_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_domain(self) -> RepositoryResult<Booking> {
        let stay = StayDates::new(self.check_in, self.check_out)
            .map_err(|e| RepositoryError::Corrupt(format!("booking {}: {}", self.id, e)))?;
        let status = self
            .status
            .parse::<BookingStatus>()
            .map_err(|e| RepositoryError::Corrupt(format!("booking {}: {}", self.id, e)))?;

        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            hotel_id: self.hotel_id,
            room_id: self.room_id,
            stay,
            guests: self.guests,
            total_amount: self.total_amount,
            status,
            guest: GuestInfo {
                guest_name: self.guest_name,
                guest_email: self.guest_email,
                guest_phone: self.guest_phone,
                special_requests: self.special_requests,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    amount: BigDecimal,
    currency: String,
    method: String,
    status: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> RepositoryResult<Payment> {
        let id = self.id;
        let corrupt = move |e: crate::domain::UnknownVariant| {
            RepositoryError::Corrupt(format!("payment {}: {}", id, e))
        };
        let method = self.method.parse().map_err(corrupt)?;
        let status = self.status.parse().map_err(corrupt)?;

        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            amount: self.amount,
            currency: self.currency,
            method,
            status,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            gateway_signature: self.gateway_signature,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HotelRow {
    id: i64,
    name: String,
    city: String,
    address: Option<String>,
}

impl HotelRow {
    fn into_domain(self) -> Hotel {
        Hotel {
            id: self.id,
            name: self.name,
            city: self.city,
            address: self.address,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    hotel_id: i64,
    room_number: String,
    room_type: String,
    price_per_night: BigDecimal,
    capacity: i32,
    available: bool,
}

impl RoomRow {
    fn into_domain(self) -> Room {
        Room {
            id: self.id,
            hotel_id: self.hotel_id,
            room_number: self.room_number,
            room_type: self.room_type,
            price_per_night: self.price_per_night,
            capacity: self.capacity,
            available: self.available,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
}

impl UserRow {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
        }
    }
}
