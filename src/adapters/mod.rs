//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event writer and outbox relay
//! - `broker` - Redis Streams publisher and an in-memory broker
//! - `postgres` - sqlx catalog repositories and outbox store
//! - `memory` - In-memory catalog with transactional semantics

pub mod broker;
pub mod events;
pub mod memory;
pub mod postgres;

pub use broker::{InMemoryBroker, RedisStreamPublisher};
pub use events::{EventWriter, OutboxRelay, OutboxRelayConfig, RelayError, RelayOutcome};
pub use memory::{InMemoryCatalog, InMemoryTransaction};
