//! Outbox record model.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, GenreId, OutboxId, Timestamp, TrackId,
};

/// Kind of catalog change an outbox record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Operation::Add),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Unknown outbox operation: {}", other),
            )),
        }
    }
}

/// Delivery state of an outbox record.
///
/// The only legal transition is `Pending -> Sent`. A sent record is inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Written but not yet confirmed by the broker
    Pending,
    /// Broker durably acknowledged the message carrying this record
    Sent,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
        }
    }
}

impl FromStr for OutboxStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            other => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Unknown outbox status: {}", other),
            )),
        }
    }
}

/// Denormalized snapshot of a track carried by add/update events.
///
/// Redundant with the track row on purpose: the relay never reads the
/// catalog at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub source: String,
    pub name: String,
    pub genre_id: Option<GenreId>,
}

/// A catalog change together with the data its consumers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackChange {
    Added(TrackPayload),
    Updated(TrackPayload),
    Deleted,
}

impl TrackChange {
    pub fn operation(&self) -> Operation {
        match self {
            TrackChange::Added(_) => Operation::Add,
            TrackChange::Updated(_) => Operation::Update,
            TrackChange::Deleted => Operation::Delete,
        }
    }

    pub fn payload(&self) -> Option<&TrackPayload> {
        match self {
            TrackChange::Added(payload) | TrackChange::Updated(payload) => Some(payload),
            TrackChange::Deleted => None,
        }
    }

    /// Rebuilds a change from its stored columns.
    ///
    /// Add and update rows must carry a payload; delete rows carry none.
    pub fn from_parts(
        operation: Operation,
        payload: Option<TrackPayload>,
    ) -> Result<Self, DomainError> {
        match (operation, payload) {
            (Operation::Add, Some(payload)) => Ok(TrackChange::Added(payload)),
            (Operation::Update, Some(payload)) => Ok(TrackChange::Updated(payload)),
            (Operation::Delete, _) => Ok(TrackChange::Deleted),
            (op, None) => Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!("Outbox record for '{}' is missing its payload", op),
            )),
        }
    }
}

/// An outbox record as handed to storage, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxRecord {
    pub event_id: EventId,
    pub subject_id: TrackId,
    pub change: TrackChange,
    pub created_at: Timestamp,
}

impl NewOutboxRecord {
    pub fn new(event_id: EventId, subject_id: TrackId, change: TrackChange) -> Self {
        Self {
            event_id,
            subject_id,
            change,
            created_at: Timestamp::now(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.change.operation()
    }

    /// Attaches the storage-assigned id. New records are always pending.
    pub fn into_record(self, id: OutboxId) -> OutboxRecord {
        OutboxRecord {
            id,
            event_id: self.event_id,
            subject_id: self.subject_id,
            change: self.change,
            status: OutboxStatus::Pending,
            created_at: self.created_at,
        }
    }
}

/// A stored outbox record: the unit of pending work for the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    /// Storage-assigned position; oldest-first order
    pub id: OutboxId,

    /// Idempotency key for downstream consumers
    pub event_id: EventId,

    /// Track the event concerns
    pub subject_id: TrackId,

    pub change: TrackChange,

    pub status: OutboxStatus,

    pub created_at: Timestamp,
}

impl OutboxRecord {
    pub fn operation(&self) -> Operation {
        self.change.operation()
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    /// Flips the record to `Sent`. Idempotent.
    pub fn mark_sent(&mut self) {
        self.status = OutboxStatus::Sent;
    }
}
