//! In-memory broker implementation for testing.
//!
//! Records every accepted batch so tests can assert on delivery order and
//! duplicates. Failures can be injected for the next publish call.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.
//! Production code should use the Redis Streams publisher.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::foundation::TrackId;
use crate::domain::outbox::BrokerMessage;
use crate::ports::{BrokerPublisher, PublishError};

/// A failure queued for an upcoming publish.
#[derive(Debug, Clone)]
enum Injected {
    Fail(PublishError),
    /// Broker keeps the first `n` messages, then reports the shortfall.
    PartialAck(usize),
}

/// In-memory broker for testing.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(InMemoryBroker::new());
/// broker.reject_next("leader not available");
///
/// assert!(relay.run_once().await.is_err());
/// relay.run_once().await?;
///
/// assert_eq!(broker.batch_count(), 1);
/// ```
#[derive(Default)]
pub struct InMemoryBroker {
    batches: Mutex<Vec<Vec<BrokerMessage>>>,
    injected: Mutex<VecDeque<Injected>>,
    delay: Mutex<Duration>,
}

impl InMemoryBroker {
    /// Creates a new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next publish with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: PublishError) {
        self.injected
            .lock()
            .expect("InMemoryBroker: injected lock poisoned")
            .push_back(Injected::Fail(error));
    }

    /// Reject the next publish outright.
    pub fn reject_next(&self, reason: &str) {
        self.fail_next(PublishError::Rejected(reason.to_string()));
    }

    /// Accept only the first `acknowledged` messages of the next publish.
    ///
    /// The accepted prefix is delivered, which is what produces duplicates
    /// once the relay republishes the whole batch.
    pub fn partial_ack_next(&self, acknowledged: usize) {
        self.injected
            .lock()
            .expect("InMemoryBroker: injected lock poisoned")
            .push_back(Injected::PartialAck(acknowledged));
    }

    /// Wait this long before acknowledging each publish.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("InMemoryBroker: delay lock poisoned") = delay;
    }

    // === Test Helpers ===

    /// Returns every delivered batch, in delivery order.
    pub fn batches(&self) -> Vec<Vec<BrokerMessage>> {
        self.batches
            .lock()
            .expect("InMemoryBroker: batches lock poisoned")
            .clone()
    }

    /// Returns every delivered message, flattened in delivery order.
    pub fn messages(&self) -> Vec<BrokerMessage> {
        self.batches().into_iter().flatten().collect()
    }

    /// Returns the delivered messages keyed by one track.
    pub fn messages_for(&self, key: TrackId) -> Vec<BrokerMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.key == key)
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages().len()
    }

    pub fn batch_count(&self) -> usize {
        self.batches
            .lock()
            .expect("InMemoryBroker: batches lock poisoned")
            .len()
    }

    /// Clears all delivered messages.
    pub fn clear(&self) {
        self.batches
            .lock()
            .expect("InMemoryBroker: batches lock poisoned")
            .clear();
    }

    fn deliver(&self, messages: &[BrokerMessage]) {
        if messages.is_empty() {
            return;
        }
        self.batches
            .lock()
            .expect("InMemoryBroker: batches lock poisoned")
            .push(messages.to_vec());
    }
}

#[async_trait]
impl BrokerPublisher for InMemoryBroker {
    async fn publish_batch(&self, messages: &[BrokerMessage]) -> Result<(), PublishError> {
        let delay = *self.delay.lock().expect("InMemoryBroker: delay lock poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let injected = self
            .injected
            .lock()
            .expect("InMemoryBroker: injected lock poisoned")
            .pop_front();

        match injected {
            None => {
                self.deliver(messages);
                Ok(())
            }
            Some(Injected::Fail(error)) => Err(error),
            Some(Injected::PartialAck(acknowledged)) => {
                let acknowledged = acknowledged.min(messages.len());
                self.deliver(&messages[..acknowledged]);
                if acknowledged == messages.len() {
                    Ok(())
                } else {
                    Err(PublishError::PartialAck {
                        acknowledged,
                        expected: messages.len(),
                    })
                }
            }
        }
    }
}
