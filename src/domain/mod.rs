//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `catalog` - Tracks and albums whose mutations emit events
//! - `outbox` - Outbox records and the broker wire format

pub mod catalog;
pub mod foundation;
pub mod outbox;
