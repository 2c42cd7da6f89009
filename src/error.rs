use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::booking::InvalidStayDates;
use crate::domain::{Booking, BookingStatus, StayDates};
use crate::ports::{GatewayError, RepositoryError};

/// Failures of the booking core. Every public service operation returns one
/// of these; nothing is retried or swallowed inside the core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("room {room_id} is already booked between {check_in} and {check_out}")]
    Conflict {
        room_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
        existing: Option<Uuid>,
    },

    #[error("not allowed: {0}")]
    Unauthorized(String),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("payment verification failed for order {0}")]
    VerificationFailed(String),

    #[error("mock payments are disabled")]
    MockPaymentsDisabled,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<InvalidStayDates> for CoreError {
    fn from(e: InvalidStayDates) -> Self {
        CoreError::InvalidRange(e.to_string())
    }
}

impl CoreError {
    /// Conflict for a requested stay, attributed to `existing` when known.
    pub fn conflict(room_id: i64, stay: &StayDates, existing: Option<&Booking>) -> Self {
        CoreError::Conflict {
            room_id,
            check_in: stay.check_in(),
            check_out: stay.check_out(),
            existing: existing.map(|b| b.id),
        }
    }

    /// Converts a repository failure, naming `entity` when it was missing.
    pub fn from_repository(e: RepositoryError, entity: impl Into<String>) -> Self {
        match e {
            RepositoryError::NotFound(_) => CoreError::NotFound(entity.into()),
            RepositoryError::InvalidTransition { from, to } => {
                CoreError::InvalidTransition { from, to }
            }
            RepositoryError::Conflict(Some(existing)) => CoreError::Conflict {
                room_id: existing.room_id,
                check_in: existing.stay.check_in(),
                check_out: existing.stay.check_out(),
                existing: Some(existing.id),
            },
            RepositoryError::Conflict(None) => {
                CoreError::Storage("unattributed booking conflict".to_string())
            }
            RepositoryError::AlreadySettled(stored) => CoreError::Storage(format!(
                "payment {} was settled concurrently",
                stored.id
            )),
            RepositoryError::Database(msg) | RepositoryError::Corrupt(msg) => {
                CoreError::Storage(msg)
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            CoreError::InvalidRange(_) | CoreError::Validation(_) => {
                AppError::Validation(e.to_string())
            }
            CoreError::Conflict { .. } | CoreError::InvalidTransition { .. } => {
                AppError::Conflict(e.to_string())
            }
            CoreError::Unauthorized(_) | CoreError::MockPaymentsDisabled => {
                AppError::Forbidden(e.to_string())
            }
            CoreError::VerificationFailed(_) => AppError::BadRequest(e.to_string()),
            CoreError::Gateway(ref inner) => {
                tracing::error!("Payment gateway failure: {}", inner);
                AppError::BadGateway("payment provider unavailable".to_string())
            }
            CoreError::Storage(ref msg) => {
                tracing::error!("Storage failure: {}", msg);
                AppError::DatabaseError("storage unavailable".to_string())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_error_status_code() {
        let error = AppError::Conflict("Room taken".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_core_errors_map_to_http() {
        let cases = [
            (CoreError::NotFound("booking 1".into()), StatusCode::NOT_FOUND),
            (CoreError::InvalidRange("empty".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::Conflict {
                    room_id: 1,
                    check_in: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
                    check_out: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
                    existing: None,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::Unauthorized("not yours".into()), StatusCode::FORBIDDEN),
            (
                CoreError::InvalidTransition {
                    from: BookingStatus::Cancelled,
                    to: BookingStatus::Confirmed,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::VerificationFailed("order_1".into()), StatusCode::BAD_REQUEST),
            (
                CoreError::Gateway(GatewayError::Request("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (CoreError::MockPaymentsDisabled, StatusCode::FORBIDDEN),
            (CoreError::Storage("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (core, expected) in cases {
            assert_eq!(AppError::from(core).status_code(), expected);
        }
    }

    #[test]
    fn test_storage_detail_is_not_exposed() {
        let error = AppError::from(CoreError::Storage("password authentication failed".into()));
        assert!(!error.to_string().contains("password"));
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Booking not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unauthorized_error_response() {
        let error = AppError::Unauthorized("missing x-user-id".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
