//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub booking: BookingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Comma-separated list of allowed CORS origins
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_cors_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

/// Payment gateway configuration
///
/// The gateway is an external hosted-checkout provider; Parkhub only needs
/// a base URL to create/retrieve sessions, an API key, and a shared secret
/// for webhook signature verification.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Gateway API base URL
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,

    /// Gateway API key
    #[serde(default)]
    pub api_key: String,

    /// Shared secret for webhook signature verification
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,

    /// ISO currency code for checkout sessions
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Where the customer lands after a successful payment
    #[serde(default = "default_success_redirect")]
    pub success_redirect: String,

    /// Where the customer lands after a failed/abandoned payment
    #[serde(default = "default_failure_redirect")]
    pub failure_redirect: String,
}

fn default_gateway_base_url() -> String {
    "http://localhost:9400".to_string()
}

fn default_webhook_secret() -> String {
    "parkhub-webhook-secret-change-in-production".to_string()
}

fn default_currency() -> String {
    "npr".to_string()
}

fn default_success_redirect() -> String {
    "http://localhost:3000/my-bookings".to_string()
}

fn default_failure_redirect() -> String {
    "http://localhost:3000/booking-failed".to_string()
}

/// Booking and hold policy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BookingConfig {
    /// Price per parked minute
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: f64,

    /// Default checkout hold duration in minutes
    #[serde(default = "default_hold_minutes")]
    pub default_hold_minutes: i64,

    /// Expiry sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Change notifier broadcast channel capacity
    #[serde(default = "default_notifier_capacity")]
    pub notifier_capacity: usize,
}

fn default_rate_per_minute() -> f64 {
    10.0
}

fn default_hold_minutes() -> i64 {
    15
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_notifier_capacity() -> usize {
    1024
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.cors_origins", default_cors_origins())?
            .set_default("gateway.base_url", default_gateway_base_url())?
            .set_default("gateway.api_key", "")?
            .set_default("gateway.webhook_secret", default_webhook_secret())?
            .set_default("gateway.currency", "npr")?
            .set_default("gateway.success_redirect", default_success_redirect())?
            .set_default("gateway.failure_redirect", default_failure_redirect())?
            .set_default("booking.rate_per_minute", 10.0)?
            .set_default("booking.default_hold_minutes", 15)?
            .set_default("booking.sweep_interval_secs", 60)?
            .set_default("booking.notifier_capacity", 1024)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with PARKHUB_ prefix
            .add_source(
                Environment::with_prefix("PARKHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: 10.0,
            default_hold_minutes: 15,
            sweep_interval_secs: 60,
            notifier_capacity: 1024,
        }
    }
}
