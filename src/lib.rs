//! Catalog Outbox - Transactional outbox for the music catalog.
//!
//! Catalog mutations stage one outbox record per track change in the same
//! storage transaction as the change itself. A relay drains pending records
//! to a Redis Streams broker in id order and marks them sent only after the
//! broker acknowledged the whole batch. Delivery is at-least-once; consumers
//! deduplicate on `event_id`.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
