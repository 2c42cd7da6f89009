use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{BookingStatus, Payment, PaymentStatus, Transition};
use crate::error::CoreError;
use crate::ports::{GatewayOrder, PaymentGateway, PaymentRepository, RepositoryError};
use crate::services::BookingService;

/// Result of `PaymentService::initiate`.
#[derive(Debug, Clone)]
pub struct InitiatedPayment {
    pub order: GatewayOrder,
    pub payment: Payment,
}

/// Turns gateway outcomes into booking transitions. Never writes a booking
/// directly; every status change goes through `BookingService`.
pub struct PaymentService {
    bookings: Arc<BookingService>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    enable_mock_payments: bool,
}

impl PaymentService {
    pub fn new(
        bookings: Arc<BookingService>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        currency: impl Into<String>,
        enable_mock_payments: bool,
    ) -> Self {
        Self {
            bookings,
            payments,
            gateway,
            currency: currency.into(),
            enable_mock_payments,
        }
    }

    /// Opens a gateway order for the booking's snapshotted total and records
    /// a PENDING payment against it. Only PENDING bookings can be paid for.
    /// A gateway failure records nothing.
    pub async fn initiate(&self, booking_id: Uuid) -> Result<InitiatedPayment, CoreError> {
        let booking = self.bookings.get_by_id(booking_id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(CoreError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }

        let receipt = format!("receipt_{}", booking.id);
        let order = self
            .gateway
            .create_order(&booking.total_amount, &self.currency, &receipt)
            .await?;

        let payment =
            Payment::pending_for_order(&booking, &self.currency, order.id.clone(), Utc::now());
        let payment = self.payments.insert(&payment).await.map_err(|e| {
            CoreError::from_repository(e, format!("payment for booking {}", booking.id))
        })?;

        tracing::info!(
            booking_id = %booking.id,
            payment_id = %payment.id,
            order_id = %order.id,
            amount = %payment.amount,
            "Payment order created"
        );
        Ok(InitiatedPayment { order, payment })
    }

    /// Settles a gateway callback. A bad signature fails the payment and
    /// leaves the booking PENDING so the guest can retry. A payment that is
    /// already COMPLETED is never downgraded by a later callback.
    pub async fn confirm(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Payment, CoreError> {
        let mut payment = self.by_order(gateway_order_id).await?;
        if payment.is_settled() {
            tracing::debug!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment already settled"
            );
            return Ok(payment);
        }

        if !self
            .gateway
            .verify_signature(gateway_order_id, gateway_payment_id, signature)
        {
            payment.fail(Some(gateway_payment_id.to_string()), Utc::now());
            let stored = self.save(&payment).await?;
            tracing::warn!(
                payment_id = %stored.id,
                order_id = gateway_order_id,
                status = %stored.status,
                "Payment signature verification failed"
            );
            return Err(CoreError::VerificationFailed(gateway_order_id.to_string()));
        }

        let outcome = self
            .bookings
            .set_status(payment.booking_id, BookingStatus::Confirmed)
            .await;
        match outcome {
            Err(e) => {
                payment.fail(Some(gateway_payment_id.to_string()), Utc::now());
                let stored = self.save(&payment).await?;
                tracing::warn!(
                    payment_id = %stored.id,
                    booking_id = %stored.booking_id,
                    status = %stored.status,
                    error = %e,
                    "Captured payment could not confirm its booking; amount needs a refund"
                );
                return Err(e);
            }
            Ok((_, Transition::Unchanged)) => {
                // A concurrent callback for this same order may have won.
                let current = self.by_order(gateway_order_id).await?;
                if current.is_settled() {
                    return Ok(current);
                }
                tracing::warn!(
                    payment_id = %payment.id,
                    booking_id = %payment.booking_id,
                    "Booking was already confirmed by another payment; amount needs a refund"
                );
            }
            Ok((_, Transition::Applied { .. })) => {}
        }

        payment.complete(
            gateway_payment_id.to_string(),
            Some(signature.to_string()),
            Utc::now(),
        );
        let payment = self.save(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            booking_id = %payment.booking_id,
            status = %payment.status,
            "Payment completed"
        );
        Ok(payment)
    }

    /// Marks the booking paid without a gateway round trip. Only available
    /// when mock payments are switched on.
    pub async fn mock_complete(&self, booking_id: Uuid) -> Result<Payment, CoreError> {
        if !self.enable_mock_payments {
            return Err(CoreError::MockPaymentsDisabled);
        }

        let booking = self.bookings.get_by_id(booking_id).await?;
        let latest = self.status_for(booking_id).await?;
        if let Some(done) = latest.as_ref().filter(|p| p.status == PaymentStatus::Completed) {
            return Ok(done.clone());
        }

        self.bookings
            .admin_set_status(booking_id, BookingStatus::Confirmed)
            .await?;

        let mut payment = match latest {
            Some(existing) if !existing.is_settled() => existing,
            _ => {
                let fresh = Payment::mock(&booking, &self.currency, Utc::now());
                self.payments.insert(&fresh).await.map_err(|e| {
                    CoreError::from_repository(e, format!("payment for booking {}", booking_id))
                })?
            }
        };

        payment.complete(format!("mock_{}", Uuid::new_v4().simple()), None, Utc::now());
        let payment = self.save(&payment).await?;
        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            "Mock payment completed"
        );
        Ok(payment)
    }

    /// Latest payment for the booking, `None` when there has been no attempt.
    pub async fn status_for(&self, booking_id: Uuid) -> Result<Option<Payment>, CoreError> {
        self.payments
            .latest_for_booking(booking_id)
            .await
            .map_err(|e| {
                CoreError::from_repository(e, format!("payments of booking {}", booking_id))
            })
    }

    async fn by_order(&self, gateway_order_id: &str) -> Result<Payment, CoreError> {
        self.payments
            .get_by_order_id(gateway_order_id)
            .await
            .map_err(|e| {
                CoreError::from_repository(e, format!("payment for order {}", gateway_order_id))
            })
    }

    /// Writes `payment`. When the stored row settled in the meantime the
    /// write is dropped and the stored row is returned.
    async fn save(&self, payment: &Payment) -> Result<Payment, CoreError> {
        match self.payments.update(payment).await {
            Ok(saved) => Ok(saved),
            Err(RepositoryError::AlreadySettled(stored)) => {
                tracing::warn!(
                    payment_id = %stored.id,
                    stored = %stored.status,
                    dropped = %payment.status,
                    "Payment settled concurrently; stale write dropped"
                );
                Ok(*stored)
            }
            Err(e) => Err(CoreError::from_repository(e, format!("payment {}", payment.id))),
        }
    }
}
