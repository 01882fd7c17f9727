use std::{env::VarError, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server_port: u16,
    pub notification_service_url: String,
    pub notification_batch_size: i64,
    pub notification_poll_interval: Duration,
    /// First retry delay of a failed confirmation; later retries double it.
    pub notification_retry_base: Duration,
    pub order_number_prefix: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("database_max_connections", &self.database.max_connections)
            .field("server_port", &self.server_port)
            .field("notification_service_url", &self.notification_service_url)
            .field("notification_batch_size", &self.notification_batch_size)
            .field("notification_poll_interval", &self.notification_poll_interval)
            .field("notification_retry_base", &self.notification_retry_base)
            .field("order_number_prefix", &self.order_number_prefix)
            .finish()
    }
}

/// Loads the configuration from the process environment. Call
/// `bootstrap::init_env` first so `.env` is honoured.
pub fn load() -> Result<AppConfig, ConfigError> {
    build(|key| std::env::var(key))
}

fn build<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database = DatabaseConfig {
        url: require("DATABASE_URL")?,
        max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?,
    };
    let server_port = parse(&lookup, "SERVER_PORT", "3000")?;
    let notification_service_url = or_default(
        "NOTIFICATION_SERVICE_URL",
        "http://localhost:3000/notification-service",
    )
    .trim_end_matches('/')
    .to_string();
    let notification_batch_size: i64 = parse(&lookup, "NOTIFICATION_QUEUE_CAPACITY", "256")?;
    if notification_batch_size < 1 {
        return Err(ConfigError::InvalidEnvVar {
            var: "NOTIFICATION_QUEUE_CAPACITY".into(),
            reason: "must be at least 1".into(),
        });
    }
    let notification_poll_interval =
        Duration::from_secs(parse(&lookup, "NOTIFICATION_POLL_INTERVAL_SECS", "30")?);
    let notification_retry_base =
        Duration::from_secs(parse(&lookup, "NOTIFICATION_RETRY_BASE_SECS", "30")?);
    let order_number_prefix = or_default("ORDER_NUMBER_PREFIX", "ORD");

    Ok(AppConfig {
        database,
        server_port,
        notification_service_url,
        notification_batch_size,
        notification_poll_interval,
        notification_retry_base,
        order_number_prefix,
    })
}

fn parse<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|err| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: err.to_string(),
        })
}
