//! Configuration management

use anyhow::{Context, Result};

use crate::defaults::{DEFAULT_GHL_API_BASE, GHL_API_VERSION, GHL_BOOKING_API_VERSION, GHL_HTTP_TIMEOUT_SECS};
use crate::services::ghl::GhlConfig;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials (both must be set)
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// GHL API client settings
    pub ghl: GhlConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let nats_url = non_empty("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let database_url = non_empty("DATABASE_URL").context("DATABASE_URL must be set")?;

        let timeout_seconds = match non_empty("GHL_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("GHL_HTTP_TIMEOUT_SECS must be a number of seconds (got '{}')", raw))?,
            None => GHL_HTTP_TIMEOUT_SECS,
        };
        if timeout_seconds == 0 {
            anyhow::bail!("GHL_HTTP_TIMEOUT_SECS must be greater than 0");
        }

        let ghl = GhlConfig {
            base_url: non_empty("GHL_API_BASE")
                .unwrap_or_else(|| DEFAULT_GHL_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_version: non_empty("GHL_API_VERSION").unwrap_or_else(|| GHL_API_VERSION.to_string()),
            booking_api_version: non_empty("GHL_BOOKING_API_VERSION")
                .unwrap_or_else(|| GHL_BOOKING_API_VERSION.to_string()),
            timeout_seconds,
        };

        Ok(Self {
            nats_url,
            nats_user: non_empty("NATS_USER"),
            nats_password: var("NATS_PASSWORD"),
            database_url,
            ghl,
        })
    }
}
