//! Payment attempt attached to a booking.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::booking::Booking;
use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "payment status",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Razorpay,
    Mock,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Razorpay => "RAZORPAY",
            PaymentMethod::Mock => "MOCK",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RAZORPAY" => Ok(PaymentMethod::Razorpay),
            "MOCK" => Ok(PaymentMethod::Mock),
            _ => Err(UnknownVariant {
                kind: "payment method",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub gateway_signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A payment awaiting the gateway callback for `gateway_order_id`.
    pub fn pending_for_order(
        booking: &Booking,
        currency: &str,
        gateway_order_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            amount: booking.total_amount.clone(),
            currency: currency.to_string(),
            method: PaymentMethod::Razorpay,
            status: PaymentStatus::Pending,
            gateway_order_id: Some(gateway_order_id),
            gateway_payment_id: None,
            gateway_signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mock(booking: &Booking, currency: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            amount: booking.total_amount.clone(),
            currency: currency.to_string(),
            method: PaymentMethod::Mock,
            status: PaymentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            gateway_signature: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, PaymentStatus::Completed | PaymentStatus::Refunded)
    }

    pub fn complete(
        &mut self,
        gateway_payment_id: String,
        signature: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status = PaymentStatus::Completed;
        self.gateway_payment_id = Some(gateway_payment_id);
        self.gateway_signature = signature;
        self.updated_at = now;
    }

    pub fn fail(&mut self, gateway_payment_id: Option<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        if gateway_payment_id.is_some() {
            self.gateway_payment_id = gateway_payment_id;
        }
        self.updated_at = now;
    }
}
