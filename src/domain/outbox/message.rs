//! Broker message built from an outbox record.
//!
//! The JSON body is the one bit-exact boundary of the system:
//!
//! ```json
//! {"event_id": "…", "subject_id": 42, "operation": "update",
//!  "source": "tracks/42.mp3", "name": "Song", "genre_id": 3}
//! ```
//!
//! Payload fields are omitted for `delete`. Consumers deduplicate on
//! `event_id`, so its type and value never change across republishes.

use serde::{Deserialize, Serialize};

use super::record::{Operation, OutboxRecord, TrackPayload};
use crate::domain::foundation::{DomainError, ErrorCode, EventId, TrackId};

/// Wire schema of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub event_id: EventId,
    pub subject_id: TrackId,
    pub operation: Operation,
    #[serde(flatten)]
    pub payload: Option<TrackPayload>,
}

impl From<&OutboxRecord> for OutboxMessage {
    fn from(record: &OutboxRecord) -> Self {
        Self {
            event_id: record.event_id.clone(),
            subject_id: record.subject_id,
            operation: record.operation(),
            payload: record.change.payload().cloned(),
        }
    }
}

/// A message ready for the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub event_id: EventId,
    /// Partitioning key; every event of one track shares it
    pub key: TrackId,
    /// Serialized [`OutboxMessage`]
    pub body: String,
}

impl BrokerMessage {
    /// Serializes an outbox record into a broker message.
    pub fn from_record(record: &OutboxRecord) -> Result<Self, DomainError> {
        let body = serde_json::to_string(&OutboxMessage::from(record)).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationFailed,
                format!("Failed to encode outbox record {}: {}", record.id, e),
            )
        })?;

        Ok(Self {
            event_id: record.event_id.clone(),
            key: record.subject_id,
            body,
        })
    }

    /// Partition this message lands in when the topic has `partitions`
    /// partitions. Stable per key, so one track's events stay ordered.
    pub fn partition(&self, partitions: u32) -> u32 {
        (self.key.value() % u64::from(partitions.max(1))) as u32
    }
}
