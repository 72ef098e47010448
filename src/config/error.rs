//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid broker URL format")]
    InvalidBrokerUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Broker topic must not be empty or contain ':'")]
    InvalidTopic,

    #[error("Broker partitions must be between 1 and 1024")]
    InvalidPartitions,

    #[error("Relay batch size must be between 1 and 10000")]
    InvalidBatchSize,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Invalid log filter directive: {0}")]
    InvalidLogLevel(String),
}
