pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::config::PaymentConfig;
use crate::health::DependencyChecker;
use crate::middleware::request_logger::{request_logger_middleware, RequestLogConfig};
use crate::ports::{
    BookingRepository, CatalogStore, PaymentGateway, PaymentRepository, UserDirectory,
};
use crate::services::{AvailabilityService, BookingService, PaymentService};

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub payments: Arc<PaymentService>,
    pub availability: Arc<AvailabilityService>,
    pub admin_api_key: Arc<str>,
    pub health_checkers: Arc<Vec<Arc<dyn DependencyChecker>>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wires every service over one store implementing all repository ports.
    pub fn new<S>(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        payments: &PaymentConfig,
        admin_api_key: &str,
    ) -> Self
    where
        S: BookingRepository + PaymentRepository + CatalogStore + UserDirectory + 'static,
    {
        let bookings = Arc::new(BookingService::new(store.clone(), store.clone(), store.clone()));
        let payment_service = PaymentService::new(
            bookings.clone(),
            store.clone(),
            gateway,
            payments.currency.clone(),
            payments.enable_mock_payments,
        );
        let availability = AvailabilityService::new(store.clone(), store);

        Self {
            bookings,
            payments: Arc::new(payment_service),
            availability: Arc::new(availability),
            admin_api_key: Arc::from(admin_api_key),
            health_checkers: Arc::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    pub fn with_health_checkers(mut self, checkers: Vec<Arc<dyn DependencyChecker>>) -> Self {
        self.health_checkers = Arc::new(checkers);
        self
    }
}

/// HTTP-level options that do not belong to the services.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub cors_allowed_origins: Vec<String>,
    pub log_request_body: bool,
}

pub fn create_app(state: AppState, options: &AppOptions) -> Router {
    let admin = Router::new()
        .route("/bookings", get(handlers::admin::list_bookings))
        .route("/bookings/:id/status", put(handlers::admin::set_booking_status))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::admin_auth,
        ));

    let api = Router::new()
        .route("/bookings", post(handlers::bookings::create_booking))
        .route("/bookings/my", get(handlers::bookings::my_bookings))
        .route("/bookings/:id", get(handlers::bookings::get_booking))
        .route("/bookings/:id/cancel", put(handlers::bookings::cancel_booking))
        .route("/search/rooms", get(handlers::search::search_rooms))
        .route("/payments/orders", post(handlers::payments::create_order))
        .route("/payments/verify", post(handlers::payments::verify_payment))
        .route("/payments/mock/:booking_id", post(handlers::payments::mock_payment))
        .route("/payments/booking/:booking_id", get(handlers::payments::payment_status))
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(axum_middleware::from_fn_with_state(
            RequestLogConfig {
                log_body: options.log_request_body,
            },
            request_logger_middleware,
        ))
        .layer(cors_layer(&options.cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-user-id"),
        ])
}
