use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stayease_core::adapters::PostgresStore;
use stayease_core::cli::{self, BookingCommands, Cli, Commands, DbCommands};
use stayease_core::config::{Config, LogFormat};
use stayease_core::gateway::RazorpayClient;
use stayease_core::health::{DependencyChecker, GatewayChecker, PostgresChecker};
use stayease_core::{create_app, startup, AppOptions, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Booking(BookingCommands::SetStatus { booking_id, status }) => {
            cli::handle_booking_set_status(&config, booking_id, status).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sqlx=warn".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = cli::create_pool(&config).await?;
    cli::run_migrations(&pool).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    if !report.is_valid() {
        report.print();
        anyhow::bail!("startup validation failed");
    }

    let gateway = RazorpayClient::from_config(&config.payments);
    tracing::info!(
        "Razorpay client initialized with URL: {}",
        config.payments.razorpay_base_url
    );
    if config.payments.enable_mock_payments {
        tracing::warn!("Mock payment completion is enabled");
    }

    let checkers: Vec<Arc<dyn DependencyChecker>> = vec![
        Arc::new(PostgresChecker::new(pool.clone())),
        Arc::new(GatewayChecker::new(gateway.clone())),
    ];

    let store = Arc::new(PostgresStore::new(pool));
    let state = AppState::new(
        store,
        Arc::new(gateway),
        &config.payments,
        &config.admin_api_key,
    )
    .with_health_checkers(checkers);

    let app = create_app(
        state,
        &AppOptions {
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            log_request_body: config.log_request_body,
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
