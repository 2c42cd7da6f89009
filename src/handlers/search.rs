use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::requested_stay;
use crate::domain::Room;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub hotel_id: i64,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub hotel_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub rooms: Vec<Room>,
}

pub async fn search_rooms(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Query(params) = params?;
    let stay = requested_stay(params.check_in, params.check_out)?;
    if params.guests.is_some_and(|g| g < 1) {
        return Err(AppError::Validation("guests must be at least 1".to_string()));
    }

    let rooms = state
        .availability
        .search(params.hotel_id, &stay, params.guests)
        .await?;

    Ok(Json(SearchResponse {
        hotel_id: params.hotel_id,
        check_in: stay.check_in(),
        check_out: stay.check_out(),
        nights: stay.nights(),
        rooms,
    }))
}
