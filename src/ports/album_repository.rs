//! AlbumRepository port - Album persistence with outbox emission.

use async_trait::async_trait;

use crate::domain::catalog::{Album, CatalogError, NewAlbum, NewTrack, TrackMeta};
use crate::domain::foundation::{AlbumId, TrackId};

/// Repository for albums and their tracks.
///
/// Each method is one storage transaction covering the album rows, the
/// track rows and one outbox record per affected track.
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    /// Find an album by id.
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>, CatalogError>;

    /// List the tracks of an album, ordered by track id.
    async fn tracks_of_album(&self, id: AlbumId) -> Result<Vec<TrackMeta>, CatalogError>;

    /// Store an album with its tracks, recording one `add` per track.
    async fn add_album_with_tracks(
        &self,
        album: &NewAlbum,
        tracks: &[NewTrack],
    ) -> Result<AlbumId, CatalogError>;

    /// Store one more track on an existing album, recording an `add`.
    async fn add_track_to_album(
        &self,
        album_id: AlbumId,
        track: &NewTrack,
    ) -> Result<TrackId, CatalogError>;

    /// Delete an album and all its tracks, recording one `delete` per track.
    async fn delete_album(&self, id: AlbumId) -> Result<(), CatalogError>;

    /// Delete one track of an album, recording a `delete`.
    ///
    /// The album itself is removed once its last track is gone.
    async fn delete_track_from_album(
        &self,
        album_id: AlbumId,
        track_id: TrackId,
    ) -> Result<(), CatalogError>;
}
