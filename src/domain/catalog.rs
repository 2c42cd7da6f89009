//! Read-only views of catalog and identity records.

use bigdecimal::BigDecimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: i64,
    pub hotel_id: i64,
    pub room_number: String,
    pub room_type: String,
    pub price_per_night: BigDecimal,
    pub capacity: i32,
    /// Advisory listing flag. Availability for a date range is decided by
    /// confirmed bookings, never by this field.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}
