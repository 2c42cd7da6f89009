use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus};
use crate::error::AppError;
use crate::ports::BookingFilter;
use crate::AppState;

const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct AdminBookingQuery {
    pub status: Option<String>,
    pub hotel_id: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusRequest {
    pub status: String,
}

fn parse_status(raw: &str) -> Result<BookingStatus, AppError> {
    raw.parse::<BookingStatus>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    params: Result<Query<AdminBookingQuery>, QueryRejection>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let Query(params) = params?;
    let filter = BookingFilter {
        status: params.status.as_deref().map(parse_status).transpose()?,
        hotel_id: params.hotel_id,
        limit: params
            .limit
            .unwrap_or(BookingFilter::default().limit)
            .clamp(1, MAX_LIST_LIMIT),
    };

    Ok(Json(state.bookings.list_admin(&filter).await?))
}

pub async fn set_booking_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<Json<Booking>, AppError> {
    let Json(payload) = payload?;
    let status = parse_status(&payload.status)?;
    Ok(Json(state.bookings.admin_set_status(id, status).await?))
}
