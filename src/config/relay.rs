//! Relay configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::events::OutboxRelayConfig;

const MAX_BATCH_SIZE: u32 = 10_000;

/// How often and how much the relay publishes.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Max records per invocation
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Delay between invocations in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Broker acknowledgment deadline in milliseconds
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_ms: u64,
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::ZeroDuration("relay.poll_interval_ms"));
        }
        if self.publish_timeout_ms == 0 {
            return Err(ValidationError::ZeroDuration("relay.publish_timeout_ms"));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval(),
            publish_timeout_ms: default_publish_timeout(),
        }
    }
}

impl From<&RelayConfig> for OutboxRelayConfig {
    fn from(config: &RelayConfig) -> Self {
        OutboxRelayConfig::default()
            .with_batch_size(config.batch_size)
            .with_poll_interval(config.poll_interval())
            .with_publish_timeout(config.publish_timeout())
    }
}

fn default_batch_size() -> u32 {
    100
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_publish_timeout() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_relay_defaults() {
        let relay = OutboxRelayConfig::from(&RelayConfig::default());
        let expected = OutboxRelayConfig::default();

        assert_eq!(relay.batch_size, expected.batch_size);
        assert_eq!(relay.poll_interval, expected.poll_interval);
        assert_eq!(relay.publish_timeout, expected.publish_timeout);
    }

    #[test]
    fn batch_size_bounds() {
        for (size, ok) in [(0, false), (1, true), (10_000, true), (10_001, false)] {
            let config = RelayConfig {
                batch_size: size,
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "batch_size = {size}");
        }
    }

    #[test]
    fn zero_publish_timeout_is_rejected() {
        let config = RelayConfig {
            publish_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::ZeroDuration("relay.publish_timeout_ms"))
        );
    }

    #[test]
    fn durations_are_milliseconds() {
        let config = RelayConfig {
            poll_interval_ms: 250,
            publish_timeout_ms: 2_000,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.publish_timeout(), Duration::from_secs(2));
    }
}
