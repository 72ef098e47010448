//! OutboxRelay - Drains pending outbox records to the message broker.
//!
//! This service implements the second half of the Transactional Outbox Pattern:
//! 1. Catalog mutations write records to the outbox (same transaction as the row change)
//! 2. **OutboxRelay fetches pending records, publishes them, marks them sent** ← This module
//!
//! ## One Invocation
//!
//! ```text
//! FETCH -> (empty: DONE) -> BUILD_BATCH -> PUBLISH -> (failure: ABORT) -> MARK_SENT -> DONE
//! ```
//!
//! FETCH, PUBLISH and MARK_SENT are three independent calls; no storage
//! transaction spans them. Records are marked sent only after the broker
//! acknowledged the whole batch. A crash between PUBLISH and MARK_SENT
//! republishes the same batch on the next run, with the same event ids,
//! which consumers deduplicate. The relay never retries inside a run: the
//! next tick is the retry.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | Time between invocations of the worker loop |
//! | `batch_size` | 100 | Max records fetched and published per invocation |
//! | `publish_timeout` | 10s | Max wait for broker acknowledgment |
//!
//! ## Concurrency
//!
//! Invocations must not overlap. [`OutboxRelay::run`] guarantees this for a
//! single process; running two relay processes against one outbox is not
//! supported.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::domain::foundation::{DomainError, OutboxId};
use crate::domain::outbox::BrokerMessage;
use crate::ports::{BrokerPublisher, OutboxStore, PublishError};

/// Configuration for the OutboxRelay service.
#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// How often the worker loop invokes the relay.
    pub poll_interval: Duration,

    /// Maximum records to publish per invocation.
    pub batch_size: u32,

    /// How long to wait for the broker to acknowledge a batch.
    pub publish_timeout: Duration,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
            publish_timeout: Duration::from_secs(10),
        }
    }
}

impl OutboxRelayConfig {
    /// Create config with custom poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create config with custom batch size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Create config with custom publish timeout.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Raise a zero batch size or poll interval to the smallest usable value.
    ///
    /// A batch of zero would never drain the outbox and a zero period is
    /// rejected by the tokio interval.
    fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(MIN_BATCH_SIZE);
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self
    }
}

const MIN_BATCH_SIZE: u32 = 1;
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of one successful invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Nothing was pending.
    Idle,
    /// This many records were published and marked sent.
    Published(usize),
}

/// Why an invocation aborted. Every variant is retried by the next run.
#[derive(Debug, Error)]
pub enum RelayError {
    /// FETCH failed; nothing changed.
    #[error("failed to fetch pending outbox records: {0}")]
    Fetch(#[source] DomainError),

    /// BUILD_BATCH failed; nothing was published or changed.
    #[error("failed to encode outbox batch: {0}")]
    Encode(#[source] DomainError),

    /// PUBLISH failed, partially or fully; nothing changed in storage.
    #[error("failed to publish batch of {batch_size} records: {source}")]
    Publish {
        batch_size: usize,
        #[source]
        source: PublishError,
    },

    /// The broker accepted the batch but storage did not record it.
    /// The records stay pending and are republished next run.
    #[error("published {published} records but failed to mark them sent: {source}")]
    MarkSent {
        published: usize,
        #[source]
        source: DomainError,
    },
}

impl RelayError {
    /// Protocol step that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            RelayError::Fetch(_) => "fetch",
            RelayError::Encode(_) => "build_batch",
            RelayError::Publish { .. } => "publish",
            RelayError::MarkSent { .. } => "mark_sent",
        }
    }
}

/// Relay that moves outbox records to the broker.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    broker: Arc<dyn BrokerPublisher>,
    config: OutboxRelayConfig,
}

impl OutboxRelay {
    /// Create a new OutboxRelay with default configuration.
    pub fn new(store: Arc<dyn OutboxStore>, broker: Arc<dyn BrokerPublisher>) -> Self {
        Self::with_config(store, broker, OutboxRelayConfig::default())
    }

    /// Create a new OutboxRelay with custom configuration.
    ///
    /// A zero `batch_size` is raised to 1 and a zero `poll_interval` to 1ms.
    pub fn with_config(
        store: Arc<dyn OutboxStore>,
        broker: Arc<dyn BrokerPublisher>,
        config: OutboxRelayConfig,
    ) -> Self {
        if config.batch_size < MIN_BATCH_SIZE || config.poll_interval < MIN_POLL_INTERVAL {
            tracing::warn!(
                batch_size = config.batch_size,
                poll_interval_ms = config.poll_interval.as_millis() as u64,
                "Outbox relay config out of range, using minimum values"
            );
        }

        Self {
            store,
            broker,
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &OutboxRelayConfig {
        &self.config
    }

    /// Run one complete invocation of the relay protocol.
    ///
    /// Either every fetched record ends up published and marked sent, or
    /// the run aborts. An abort before MARK_SENT leaves storage untouched.
    pub async fn run_once(&self) -> Result<RelayOutcome, RelayError> {
        // FETCH
        let records = self
            .store
            .select_pending(self.config.batch_size)
            .await
            .map_err(RelayError::Fetch)?;

        if records.is_empty() {
            tracing::trace!("No pending outbox records");
            return Ok(RelayOutcome::Idle);
        }

        // BUILD_BATCH, preserving fetch order
        let messages = records
            .iter()
            .map(BrokerMessage::from_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(RelayError::Encode)?;
        let batch_size = messages.len();

        // PUBLISH
        let published =
            time::timeout(self.config.publish_timeout, self.broker.publish_batch(&messages)).await;
        match published {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(RelayError::Publish { batch_size, source }),
            Err(_) => {
                return Err(RelayError::Publish {
                    batch_size,
                    source: PublishError::Timeout(self.config.publish_timeout),
                })
            }
        }

        // MARK_SENT, exactly the published batch
        let ids: Vec<OutboxId> = records.iter().map(|r| r.id).collect();
        let flipped = self
            .store
            .mark_sent(&ids)
            .await
            .map_err(|source| RelayError::MarkSent {
                published: batch_size,
                source,
            })?;

        if (flipped as usize) < batch_size {
            tracing::debug!(
                published = batch_size,
                flipped,
                "Some records were already marked sent"
            );
        }

        tracing::info!(
            published = batch_size,
            first_id = %ids[0],
            last_id = %ids[batch_size - 1],
            "Outbox batch published"
        );

        Ok(RelayOutcome::Published(batch_size))
    }

    /// Run the relay loop until shutdown signal is received.
    ///
    /// Invocations are strictly serial: a tick that fires while a run is in
    /// progress is delayed, not stacked. A failed run is logged and the loop
    /// carries on. On shutdown, the in-flight run completes and one final
    /// run drains what it can before returning.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.tick().await;
                        tracing::info!("Outbox relay stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.run_once().await {
            Ok(RelayOutcome::Idle) => {}
            Ok(RelayOutcome::Published(_)) => self.log_backlog().await,
            Err(e) => {
                tracing::warn!(
                    stage = e.stage(),
                    error = %e,
                    "Outbox relay run aborted; retrying on next tick"
                );
                self.log_backlog().await;
            }
        }
    }

    async fn log_backlog(&self) {
        match self.store.count_pending().await {
            Ok(pending) => tracing::debug!(pending, "Outbox backlog"),
            Err(e) => tracing::debug!(error = %e, "Failed to count pending outbox records"),
        }
    }
}
