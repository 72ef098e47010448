//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps and error types that form the
//! vocabulary of the catalog outbox.

mod errors;
mod events;
mod ids;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::EventId;
pub use ids::{AlbumId, GenreId, OutboxId, TrackId};
pub use timestamp::Timestamp;
