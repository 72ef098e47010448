//! Outbox adapters.
//!
//! The two halves of the Transactional Outbox Pattern:
//!
//! - `EventWriter` - Stages outbox records inside a catalog transaction
//! - `OutboxRelay` - Background service for reliable event delivery

mod event_writer;
mod outbox_relay;

pub use event_writer::EventWriter;
pub use outbox_relay::{OutboxRelay, OutboxRelayConfig, RelayError, RelayOutcome};
