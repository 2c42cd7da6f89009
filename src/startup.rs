use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    Ok(report)
}

pub(crate) fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.admin_api_key.len() < 16 {
        anyhow::bail!("ADMIN_API_KEY must be at least 16 characters");
    }
    if config.payments.razorpay_key_id.is_empty()
        || config.payments.razorpay_key_secret.is_empty()
    {
        anyhow::bail!("RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET must be set");
    }
    if config.payments.currency.len() != 3 {
        anyhow::bail!("PAYMENT_CURRENCY must be a three-letter ISO code");
    }

    url::Url::parse(&config.payments.razorpay_base_url)
        .context("RAZORPAY_BASE_URL is not a valid URL")?;
    for origin in &config.cors_allowed_origins {
        url::Url::parse(origin)
            .with_context(|| format!("CORS origin '{}' is not a valid URL", origin))?;
    }

    if config.payments.enable_mock_payments {
        tracing::warn!("ENABLE_MOCK_PAYMENTS is on; bookings can be confirmed without payment");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}
