//! Engine configuration.
//!
//! Loaded from environment variables with fallback to defaults:
//!
//! | Variable                              | Default          |
//! |---------------------------------------|------------------|
//! | `STOCKLINE_DATABASE_PATH`             | `./stockline.db` |
//! | `STOCKLINE_MAX_CONNECTIONS`           | `5`              |
//! | `STOCKLINE_BUSY_TIMEOUT_MS`           | `5000`           |
//! | `STOCKLINE_SELLER_VOID_WINDOW_HOURS`  | `24`             |
//!
//! The void window must lie in `0..=MAX_SELLER_VOID_WINDOW_HOURS`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use stockline_core::DEFAULT_SELLER_VOID_WINDOW_HOURS;

use crate::pool::DbConfig;

pub const ENV_DATABASE_PATH: &str = "STOCKLINE_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "STOCKLINE_MAX_CONNECTIONS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "STOCKLINE_BUSY_TIMEOUT_MS";
pub const ENV_SELLER_VOID_WINDOW_HOURS: &str = "STOCKLINE_SELLER_VOID_WINDOW_HOURS";

/// Longest accepted SELLER void window: ten years.
pub const MAX_SELLER_VOID_WINDOW_HOURS: i64 = 24 * 365 * 10;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Pool size.
    pub max_connections: u32,

    /// How long a transaction waits for the write lock before failing with
    /// a retryable error.
    pub busy_timeout: Duration,

    /// How long after posting a SELLER may still void their own sale.
    pub seller_void_window: chrono::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./stockline.db"),
            max_connections: 5,
            busy_timeout: Duration::from_millis(5000),
            seller_void_window: chrono::Duration::hours(DEFAULT_SELLER_VOID_WINDOW_HOURS),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            database_path: lookup(ENV_DATABASE_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, ENV_MAX_CONNECTIONS, defaults.max_connections)?,

            busy_timeout: lookup(ENV_BUSY_TIMEOUT_MS)
                .map(|v| parse_value::<u64>(ENV_BUSY_TIMEOUT_MS, &v))
                .transpose()?
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),

            seller_void_window: match lookup(ENV_SELLER_VOID_WINDOW_HOURS) {
                Some(raw) => parse_void_window(&raw)?,
                None => defaults.seller_void_window,
            },
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                name: ENV_MAX_CONNECTIONS.to_string(),
                value: "0".to_string(),
            });
        }
        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(self.busy_timeout)
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

/// Hours in `0..=MAX_SELLER_VOID_WINDOW_HOURS`.
fn parse_void_window(raw: &str) -> Result<chrono::Duration, ConfigError> {
    let hours = parse_value::<i64>(ENV_SELLER_VOID_WINDOW_HOURS, raw)?;
    if !(0..=MAX_SELLER_VOID_WINDOW_HOURS).contains(&hours) {
        return Err(ConfigError::InvalidValue {
            name: ENV_SELLER_VOID_WINDOW_HOURS.to_string(),
            value: raw.to_string(),
        });
    }
    Ok(chrono::Duration::hours(hours))
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },
}
