//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `CATALOG_OUTBOX`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use catalog_outbox::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Publishing to {}", config.broker.topic);
//! ```

mod broker;
mod database;
mod error;
mod relay;
mod telemetry;

pub use broker::BrokerConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use relay::RelayConfig;
pub use telemetry::{Environment, LogFormat, TelemetryConfig};

use serde::Deserialize;

const ENV_PREFIX: &str = "CATALOG_OUTBOX";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL holding the catalog and outbox tables
    pub database: DatabaseConfig,

    /// Redis Streams broker
    pub broker: BrokerConfig,

    /// Relay batch and polling settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CATALOG_OUTBOX` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CATALOG_OUTBOX__DATABASE__URL=...` -> `database.url = ...`
    /// - `CATALOG_OUTBOX__RELAY__BATCH_SIZE=50` -> `relay.batch_size = 50`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its expected type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.broker.validate()?;
        self.relay.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }
}
