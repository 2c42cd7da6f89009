pub mod admin;
pub mod bookings;
pub mod payments;
pub mod search;

use crate::domain::StayDates;
use crate::error::CoreError;
use crate::health::check_health;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;

/// Both dates are required; a missing one is an invalid range.
fn requested_stay(
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
) -> Result<StayDates, CoreError> {
    match (check_in, check_out) {
        (Some(check_in), Some(check_out)) => Ok(StayDates::new(check_in, check_out)?),
        (None, _) => Err(CoreError::InvalidRange("check_in is required".to_string())),
        (_, None) => Err(CoreError::InvalidRange("check_out is required".to_string())),
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = check_health(&state.health_checkers, state.start_time).await;

    // Only a failing critical dependency takes the service out of rotation.
    let status_code = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}
