//! Configuration management for the Restaurant Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RMS__ prefix

use config::{ConfigError, Environment, File};
use serde::{de::DeserializeOwned, Deserialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Socket relay configuration
    pub realtime: RealtimeConfig,

    /// Migration recovery configuration
    pub migration: MigrationConfig,

    /// First admin account, only used while the users table is empty
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeConfig {
    /// Events buffered per subscriber before it is considered lagged
    pub channel_capacity: usize,

    /// Interval between server pings on idle sockets
    pub ping_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    /// Attempts before giving up (or pushing the schema)
    pub max_attempts: u32,

    /// Base delay between attempts; multiplied by the attempt number
    pub retry_delay_ms: u64,

    /// Fall back to an idempotent schema push when migrations cannot be recovered
    pub allow_schema_push: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::layered()?.try_deserialize()
    }

    /// Load a single section, for tools that do not need the full server config
    pub fn load_section<T: DeserializeOwned>(key: &str) -> Result<T, ConfigError> {
        Self::layered()?.get(key)
    }

    fn layered() -> Result<config::Config, ConfigError> {
        let environment = std::env::var("RMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("realtime.channel_capacity", 256)?
            .set_default("realtime.ping_interval_secs", 30)?
            .set_default("migration.max_attempts", 3)?
            .set_default("migration.retry_delay_ms", 2000)?
            .set_default("migration.allow_schema_push", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RMS__ prefix)
            .add_source(
                Environment::with_prefix("RMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            allow_schema_push: false,
        }
    }
}

/// Load `.env`, then install the fmt subscriber.
///
/// `.env` goes first so a `RUST_LOG` set there is honoured.
pub fn init_tracing(default_filter: &str) {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter(default_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// `RUST_LOG` when set, otherwise `default_filter`
pub fn log_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_reads_rust_log_loaded_from_env_file() {
        let path = std::env::temp_dir().join(format!("rms-log-{}.env", std::process::id()));
        std::fs::write(&path, "RUST_LOG=restaurant_backend=trace\n").unwrap();

        std::env::remove_var("RUST_LOG");
        dotenvy::from_path(&path).unwrap();
        let filter = log_filter("warn").to_string();
        std::env::remove_var("RUST_LOG");
        std::fs::remove_file(&path).ok();

        assert!(filter.contains("restaurant_backend=trace"));
        assert!(!log_filter("warn").to_string().contains("restaurant_backend"));
    }
}
