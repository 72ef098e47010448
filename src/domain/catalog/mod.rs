//! Catalog module - the domain rows whose mutations produce outbox events.
//!
//! Only the write path that feeds the outbox lives here: tracks, albums and
//! the album/track relation. Every mutation of a track is paired with one
//! outbox record in the same storage transaction.

mod album;
mod errors;
mod track;

pub use album::{Album, NewAlbum};
pub use errors::CatalogError;
pub use track::{NewTrack, TrackMeta};
