use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::Payment;
use crate::error::AppError;
use crate::validation::validate_gateway_ref;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub booking_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    /// Minor units, as the checkout widget expects.
    pub amount: i64,
    pub currency: String,
    pub payment: Payment,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let initiated = state.payments.initiate(payload.booking_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: initiated.order.id,
            amount: initiated.order.amount_minor,
            currency: initiated.order.currency,
            payment: initiated.payment,
        }),
    ))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Result<Json<Payment>, AppError> {
    let Json(payload) = payload?;
    validate_gateway_ref("order_id", &payload.order_id)?;
    validate_gateway_ref("payment_id", &payload.payment_id)?;
    validate_gateway_ref("signature", &payload.signature)?;

    let payment = state
        .payments
        .confirm(&payload.order_id, &payload.payment_id, &payload.signature)
        .await?;
    Ok(Json(payment))
}

pub async fn mock_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(state.payments.mock_complete(booking_id).await?))
}

/// Polled by the UI; answers with a NOT_FOUND status rather than a 404.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let response = match state.payments.status_for(booking_id).await? {
        Some(payment) => Json(payment).into_response(),
        None => Json(json!({
            "booking_id": booking_id,
            "status": "NOT_FOUND",
        }))
        .into_response(),
    };
    Ok(response)
}
