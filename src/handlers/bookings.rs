use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::requested_stay;
use crate::domain::{Booking, GuestInfo};
use crate::error::AppError;
use crate::middleware::auth::ActingUser;
use crate::services::NewBooking;
use crate::validation::clean_guest_info;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub hotel_id: i64,
    pub room_id: i64,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    #[serde(default = "default_guests")]
    pub guests: i32,
    #[serde(flatten)]
    pub guest: GuestInfo,
}

fn default_guests() -> i32 {
    1
}

impl CreateBookingRequest {
    fn into_new_booking(self) -> Result<NewBooking, AppError> {
        let stay = requested_stay(self.check_in, self.check_out)?;
        Ok(NewBooking {
            hotel_id: self.hotel_id,
            room_id: self.room_id,
            stay,
            guests: self.guests,
            guest: clean_guest_info(self.guest)?,
        })
    }
}

pub async fn create_booking(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let request = payload.into_new_booking()?;
    let booking = state.bookings.create(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list_for_user(user_id).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get_for_user(user_id, id).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    ActingUser(user_id): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.cancel(user_id, id).await?))
}
