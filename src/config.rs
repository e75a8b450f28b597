use anyhow::Context;
use std::env;
use std::str::FromStr;

// ============================================================================
// Runtime Configuration
// ============================================================================
//
// MARKETPLACE_DATABASE_URL        postgres connection string; unset = in-memory
// MARKETPLACE_DB_MAX_CONNECTIONS  pool size (default 5)
// MARKETPLACE_METRICS_PORT        /metrics + /health port (default 9090, 0 = off)
// MARKETPLACE_RUN_DEMO            run the lifecycle walkthrough (default true)
//
// ============================================================================

pub const DATABASE_URL: &str = "MARKETPLACE_DATABASE_URL";
pub const DB_MAX_CONNECTIONS: &str = "MARKETPLACE_DB_MAX_CONNECTIONS";
pub const METRICS_PORT: &str = "MARKETPLACE_METRICS_PORT";
pub const RUN_DEMO: &str = "MARKETPLACE_RUN_DEMO";

#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub metrics_port: u16,
    pub run_demo: bool,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            metrics_port: 9090,
            run_demo: true,
        }
    }
}

impl MarketplaceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, DB_MAX_CONNECTIONS, defaults.db_max_connections)?,
            metrics_port: parse_or(&lookup, METRICS_PORT, defaults.metrics_port)?,
            run_demo: parse_or(&lookup, RUN_DEMO, defaults.run_demo)?,
        })
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port != 0
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
