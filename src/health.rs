use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::gateway::RazorpayClient;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.into(),
        }
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// A failing critical dependency makes the whole service unhealthy;
    /// any other failure only degrades it.
    fn critical(&self) -> bool {
        false
    }

    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn critical(&self) -> bool {
        true
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e.to_string()),
        }
    }
}

/// Reports the payment gateway breaker; never calls the gateway itself.
pub struct GatewayChecker {
    client: RazorpayClient,
}

impl GatewayChecker {
    pub fn new(client: RazorpayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DependencyChecker for GatewayChecker {
    fn name(&self) -> &'static str {
        "payment_gateway"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.client.circuit_state().as_str() {
            "closed" => DependencyStatus::healthy(start),
            state => DependencyStatus::unhealthy(format!("circuit breaker {}", state)),
        }
    }
}

pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let mut dependencies = HashMap::new();
    let mut critical = Vec::new();
    for checker in checkers {
        let status = timeout(timeout_duration, checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        if checker.critical() {
            critical.push(checker.name());
        }
        dependencies.insert(checker.name().to_string(), status);
    }

    HealthResponse {
        status: determine_overall_status(&dependencies, &critical),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(
    dependencies: &HashMap<String, DependencyStatus>,
    critical: &[&str],
) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if critical.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
