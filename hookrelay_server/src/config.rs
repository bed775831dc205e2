//! Server configuration loaded from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,

    /// Public port for HTTP/WebSocket traffic
    pub port: u16,

    /// SQLite connection string
    pub database_url: String,

    /// `APPLICATION_ENV=production`
    pub is_production: bool,

    /// Captured requests older than this are deleted by the sweeper
    pub retention_window: Duration,

    /// How often the retention sweeper runs
    pub sweep_interval: Duration,

    /// Upper bound for the history `limit` parameter
    pub max_query_limit: u32,

    /// Largest inbound body accepted on the capture path
    pub max_body_bytes: usize,

    /// Requests allowed per client IP per window
    pub rate_limit_max: u32,

    /// Rate limit window length
    pub rate_limit_window: Duration,

    /// Take the client address from `X-Forwarded-For`
    pub trust_proxy: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let is_production = env::var("APPLICATION_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);

        // Development servers stay on the loopback interface unless told otherwise
        let default_host = if is_production { "0.0.0.0" } else { "localhost" };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| default_host.to_string()),
            port: parse_var("PORT", 8080)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://hookrelay.db?mode=rwc".to_string()),
            is_production,
            retention_window: Duration::from_secs(parse_var::<u64>("RETENTION_HOURS", 4)? * 60 * 60),
            sweep_interval: Duration::from_secs(parse_var("SWEEP_INTERVAL_SECS", 300)?),
            max_query_limit: parse_var("MAX_QUERY_LIMIT", 100)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", 10 * 1024 * 1024)?,
            rate_limit_max: parse_var("RATE_LIMIT_MAX", 125)?,
            rate_limit_window: Duration::from_secs(parse_var("RATE_LIMIT_WINDOW_SECS", 60)?),
            trust_proxy: parse_var("TRUST_PROXY", false)?,
        })
    }

    /// Bind address in `host:port` form
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            database_url: "sqlite::memory:".to_string(),
            is_production: false,
            retention_window: Duration::from_secs(4 * 60 * 60),
            sweep_interval: Duration::from_secs(300),
            max_query_limit: 100,
            max_body_bytes: 10 * 1024 * 1024,
            rate_limit_max: 125,
            rate_limit_window: Duration::from_secs(60),
            trust_proxy: false,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
