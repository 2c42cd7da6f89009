use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::PostgresStore;
use crate::config::Config;
use crate::domain::BookingStatus;
use crate::services::BookingService;

#[derive(Parser)]
#[command(name = "stayease-core")]
#[command(
    about = "StayEase Core - hotel booking lifecycle and availability service",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Booking management commands
    #[command(subcommand)]
    Booking(BookingCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum BookingCommands {
    /// Move a booking to another status, following the usual transition rules
    SetStatus {
        /// Booking UUID
        #[arg(value_name = "BOOKING_ID")]
        booking_id: Uuid,

        /// PENDING, CONFIRMED, CANCELLED or COMPLETED
        #[arg(value_name = "STATUS", value_parser = parse_status)]
        status: BookingStatus,
    },
}

fn parse_status(raw: &str) -> Result<BookingStatus, String> {
    raw.parse::<BookingStatus>().map_err(|e| e.to_string())
}

pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    use sqlx::migrate::Migrator;
    use std::path::Path;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    tracing::info!("Running database migrations...");
    migrator.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_booking_set_status(
    config: &Config,
    booking_id: Uuid,
    status: BookingStatus,
) -> anyhow::Result<()> {
    let pool = create_pool(config).await?;
    let store = Arc::new(PostgresStore::new(pool));
    let service = BookingService::new(store.clone(), store.clone(), store);

    let booking = service.admin_set_status(booking_id, status).await?;
    println!("✓ Booking {} is now {}", booking.id, booking.status);
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Razorpay URL: {}", config.payments.razorpay_base_url);
    println!("  Razorpay Key ID: {}", config.payments.razorpay_key_id);
    println!("  Razorpay Key Secret: ****");
    println!("  Currency: {}", config.payments.currency);
    println!("  Mock Payments: {}", config.payments.enable_mock_payments);
    println!("  CORS Origins: {}", config.cors_allowed_origins.join(", "));

    crate::startup::validate_env_vars(config)?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
