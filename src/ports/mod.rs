//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Outbox Ports
//!
//! - `OutboxTransaction` - Storage transaction that carries outbox inserts
//! - `OutboxStore` - Relay-side fetch / mark-sent access to the outbox
//! - `BrokerPublisher` - Batch delivery to the message broker
//! - `EventIdGenerator` - Source of idempotency keys
//!
//! ## Catalog Ports
//!
//! - `TrackRepository` - Track updates
//! - `AlbumRepository` - Album and track creation/deletion

mod album_repository;
mod broker_publisher;
mod event_id_generator;
mod outbox_store;
mod track_repository;

pub use album_repository::AlbumRepository;
pub use broker_publisher::{BrokerPublisher, PublishError};
pub use event_id_generator::{EventIdGenerator, UuidEventIdGenerator};
pub use outbox_store::{OutboxStore, OutboxTransaction};
pub use track_repository::TrackRepository;
