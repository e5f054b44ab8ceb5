//! Configuration management for the SQL bridge
//!
//! Handles environment variables and command-line overrides.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Default listen port, matching the port SSE clients are usually pointed at
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default connection pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Configuration for the SQL bridge
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Postgres connection string
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    pub max_connections: u32,

    /// Close sessions idle for longer than this. `None` keeps them until the
    /// client disconnects.
    pub idle_timeout: Option<Duration>,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let host = std::env::var("SQL_BRIDGE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_var("PORT", std::env::var("PORT").ok())?.unwrap_or(DEFAULT_PORT);
        let database_url = std::env::var("DATABASE_URL").ok();
        let max_connections = parse_var(
            "SQL_BRIDGE_MAX_CONNECTIONS",
            std::env::var("SQL_BRIDGE_MAX_CONNECTIONS").ok(),
        )?
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let idle_timeout = parse_var::<u64>(
            "SQL_BRIDGE_IDLE_TIMEOUT_SECS",
            std::env::var("SQL_BRIDGE_IDLE_TIMEOUT_SECS").ok(),
        )?
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            idle_timeout,
        })
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection string, required before the store can be opened
    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            ConfigError::MissingEnvVar {
                var: "DATABASE_URL".to_string(),
            }
            .into()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: None,
        }
    }
}

/// Parse an optional raw variable value, reporting which variable was bad.
fn parse_var<T>(var: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|e: T::Err| {
            ConfigError::InvalidValue {
                var: var.to_string(),
                message: format!("{:?}: {}", value, e),
            }
            .into()
        }),
    }
}
