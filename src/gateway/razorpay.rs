use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

use crate::config::PaymentConfig;
use crate::ports::{GatewayError, GatewayOrder, PaymentGateway};

type HmacSha256 = Hmac<Sha256>;

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GatewayError::InvalidResponse(e.to_string())
        } else {
            GatewayError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

/// Subset of the `/v1/orders` response the booking flow relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
}

/// HTTP client for the Razorpay orders API
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl RazorpayClient {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self::with_circuit_breaker(base_url, key_id, key_secret, 3, 60)
    }

    pub fn from_config(config: &PaymentConfig) -> Self {
        Self::new(
            config.razorpay_base_url.clone(),
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
        )
    }

    /// Creates a client whose breaker opens after `failure_threshold`
    /// consecutive failures.
    pub fn with_circuit_breaker(
        base_url: String,
        key_id: String,
        key_secret: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        RazorpayClient {
            client,
            base_url,
            key_id,
            key_secret,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// `hex(HMAC_SHA256(secret, "<order_id>|<payment_id>"))`
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        self.mac(gateway_order_id, gateway_payment_id)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    fn mac(&self, gateway_order_id: &str, gateway_payment_id: &str) -> Option<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.key_secret.as_bytes()).ok()?;
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(gateway_payment_id.as_bytes());
        Some(mac)
    }
}

/// Amount in paise (or the currency's minor unit), truncated.
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, GatewayError> {
    (amount.clone() * BigDecimal::from(100))
        .with_scale(0)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("amount {} out of range", amount)))
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_order(
        &self,
        amount: &BigDecimal,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.base_url.trim_end_matches('/'));
        let body = serde_json::to_value(CreateOrderRequest {
            amount: to_minor_units(amount)?,
            currency,
            receipt,
            payment_capture: 1,
        })
        .map_err(|e| GatewayError::Request(e.to_string()))?;
        let client = self.client.clone();
        let key_id = self.key_id.clone();
        let key_secret = self.key_secret.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(key_id, Some(key_secret))
                    .json(&body)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let message = response
                        .json::<ErrorEnvelope>()
                        .await
                        .ok()
                        .and_then(|e| e.error.description)
                        .unwrap_or_else(|| status.to_string());
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        message,
                    });
                }

                let order = response.json::<OrderResponse>().await?;
                Ok(order)
            })
            .await;

        match result {
            Ok(order) => {
                tracing::debug!(
                    order_id = %order.id,
                    status = ?order.status,
                    "Gateway order created"
                );
                Ok(GatewayOrder {
                    id: order.id,
                    amount_minor: order.amount,
                    currency: order.currency,
                })
            }
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "Razorpay circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(gateway_order_id, gateway_payment_id)
            .is_some_and(|mac| mac.verify_slice(&expected).is_ok())
    }
}
