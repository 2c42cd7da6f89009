use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub admin_api_key: String,
    pub cors_allowed_origins: Vec<String>,
    pub log_request_body: bool,
    pub log_format: LogFormat,
    pub payments: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub razorpay_base_url: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub currency: String,
    /// Exposes the gateway-free mock completion path. Never enable in production.
    pub enable_mock_payments: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            razorpay_base_url: DEFAULT_RAZORPAY_BASE_URL.to_string(),
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            currency: DEFAULT_CURRENCY.to_string(),
            enable_mock_payments: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            admin_api_key: env::var("ADMIN_API_KEY").context("ADMIN_API_KEY is required")?,
            cors_allowed_origins: parse_origins(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
            ),
            log_request_body: parse_flag("LOG_REQUEST_BODY")?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            payments: PaymentConfig {
                razorpay_base_url: env::var("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_RAZORPAY_BASE_URL.to_string()),
                razorpay_key_id: env::var("RAZORPAY_KEY_ID")
                    .context("RAZORPAY_KEY_ID is required")?,
                razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET")
                    .context("RAZORPAY_KEY_SECRET is required")?,
                currency: env::var("PAYMENT_CURRENCY")
                    .unwrap_or_else(|_| DEFAULT_CURRENCY.to_string()),
                enable_mock_payments: parse_flag("ENABLE_MOCK_PAYMENTS")?,
            },
        })
    }
}

fn parse_flag(name: &str) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => parse_bool(&raw).with_context(|| format!("{} must be true or false", name)),
        Err(_) => Ok(false),
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("unrecognised boolean '{}'", other),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_booleans() {
        assert!(parse_bool("true").unwrap());
        assert!(parse_bool(" ON ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(!parse_bool("").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn parses_origin_list() {
        assert_eq!(
            parse_origins("http://a.test, http://b.test,,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("  ").is_empty());
    }

    #[test]
    fn mock_payments_default_off() {
        assert!(!PaymentConfig::default().enable_mock_payments);
    }
}
