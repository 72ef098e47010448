//! Outbox module - the durable record of "what happened" in the catalog.
//!
//! Records are written in the same transaction as the catalog change they
//! describe and later drained to the broker by the relay.

mod message;
mod record;

pub use message::{BrokerMessage, OutboxMessage};
pub use record::{
    NewOutboxRecord, Operation, OutboxRecord, OutboxStatus, TrackChange, TrackPayload,
};
