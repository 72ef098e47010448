//! TrackRepository port - Track persistence with outbox emission.

use async_trait::async_trait;

use crate::domain::catalog::{CatalogError, TrackMeta};
use crate::domain::foundation::TrackId;

/// Repository for track metadata.
///
/// Every mutating method writes its outbox record in the same transaction
/// as the track row.
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Find a track by id.
    async fn get_track(&self, id: TrackId) -> Result<Option<TrackMeta>, CatalogError>;

    /// Update a track and record an `update` event.
    ///
    /// # Errors
    ///
    /// - `InvalidGenre` if the genre name is unknown
    /// - `TrackNotFound` if the track does not exist
    async fn update_track(&self, track: &TrackMeta) -> Result<(), CatalogError>;
}
