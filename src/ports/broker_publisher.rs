//! BrokerPublisher port - Interface for delivering outbox messages.
//!
//! The relay hands the broker a whole batch at once. A batch either is
//! durably acknowledged in full or counts as failed; there is no partial
//! success visible to the relay.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::outbox::BrokerMessage;

/// Reasons a batch publication did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("broker rejected the batch: {0}")]
    Rejected(String),

    #[error("broker acknowledged {acknowledged} of {expected} messages")]
    PartialAck { acknowledged: usize, expected: usize },

    #[error("only {acknowledged} of {required} required replicas acknowledged the batch")]
    InsufficientReplicas { acknowledged: u32, required: u32 },

    #[error("broker did not acknowledge within {0:?}")]
    Timeout(Duration),
}

/// Port for publishing a batch of messages to the broker.
///
/// Implementations must ensure:
/// - `Ok(())` is returned only after every message is durably acknowledged
///   at the strongest level the broker offers
/// - Partial acknowledgment is reported as an error
/// - Messages with the same key keep their relative order
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    /// Publish all messages, in order, as one call.
    async fn publish_batch(&self, messages: &[BrokerMessage]) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn BrokerPublisher) {}

    #[test]
    fn partial_ack_error_reports_counts() {
        let err = PublishError::PartialAck {
            acknowledged: 2,
            expected: 3,
        };
        assert_eq!(err.to_string(), "broker acknowledged 2 of 3 messages");
    }
}
