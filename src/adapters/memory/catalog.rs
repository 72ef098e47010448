//! In-memory catalog implementation for testing.
//!
//! Implements the catalog repositories and the relay-side `OutboxStore`
//! over one shared state, with real commit/rollback semantics: every
//! repository method runs in an [`InMemoryTransaction`] that is committed
//! only once the row changes and their outbox records are all staged.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transaction::{InMemoryTransaction, Shared};
use crate::adapters::events::EventWriter;
use crate::domain::catalog::{Album, CatalogError, NewAlbum, NewTrack, TrackMeta};
use crate::domain::foundation::{AlbumId, DomainError, ErrorCode, GenreId, OutboxId, TrackId};
use crate::domain::outbox::OutboxRecord;
use crate::ports::{AlbumRepository, OutboxStore, TrackRepository};

/// In-memory catalog with an outbox table.
///
/// Cloning yields another handle on the same state.
///
/// # Example
///
/// ```ignore
/// let catalog = InMemoryCatalog::new();
/// catalog.add_genre("jazz");
///
/// let album_id = catalog
///     .add_album_with_tracks(&album, &[track])
///     .await?;
///
/// assert_eq!(catalog.pending_records().len(), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryCatalog {
    shared: Arc<Shared>,
    writer: EventWriter,
    fail_next_fetch: Arc<AtomicBool>,
    fail_next_mark_sent: Arc<AtomicBool>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::with_writer(EventWriter::default())
    }

    /// Create a catalog whose repositories stage events through `writer`.
    pub fn with_writer(writer: EventWriter) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            writer,
            fail_next_fetch: Arc::new(AtomicBool::new(false)),
            fail_next_mark_sent: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a transaction.
    pub fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction::begin(self.shared.clone())
    }

    /// Register a genre, returning its id. Registering twice is a no-op.
    pub fn add_genre(&self, name: &str) -> GenreId {
        let mut state = self.shared.state();
        if let Some(id) = state.genre_by_name(name) {
            return id;
        }
        let id = self.shared.next_genre_id();
        state.genres.insert(id, name.to_string());
        id
    }

    // === Test Helpers ===

    /// Every committed outbox record, ordered by id.
    pub fn records(&self) -> Vec<OutboxRecord> {
        self.shared.state().outbox.values().cloned().collect()
    }

    /// Committed records still waiting for the relay.
    pub fn pending_records(&self) -> Vec<OutboxRecord> {
        self.records().into_iter().filter(|r| r.is_pending()).collect()
    }

    /// Committed track, if any.
    pub fn track(&self, id: TrackId) -> Option<TrackMeta> {
        self.shared.state().track_meta(id)
    }

    pub fn track_count(&self) -> usize {
        self.shared.state().tracks.len()
    }

    pub fn album_count(&self) -> usize {
        self.shared.state().albums.len()
    }

    /// Fail the next `select_pending` call.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Fail the next `mark_sent` call without changing anything.
    pub fn fail_next_mark_sent(&self) {
        self.fail_next_mark_sent.store(true, Ordering::SeqCst);
    }

    /// Fail the next outbox insert, aborting its transaction.
    pub fn fail_next_outbox_insert(&self) {
        self.shared
            .fail_next_outbox_insert
            .store(true, Ordering::SeqCst);
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackRepository for InMemoryCatalog {
    async fn get_track(&self, id: TrackId) -> Result<Option<TrackMeta>, CatalogError> {
        Ok(self.track(id))
    }

    async fn update_track(&self, track: &TrackMeta) -> Result<(), CatalogError> {
        track.validate()?;

        let mut tx = self.begin();
        let payload = tx.update_track(track)?;
        self.writer.record_update(&mut tx, track.id, payload).await?;
        tx.commit()?;

        Ok(())
    }
}

#[async_trait]
impl AlbumRepository for InMemoryCatalog {
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>, CatalogError> {
        Ok(self.shared.state().albums.get(&id).cloned())
    }

    async fn tracks_of_album(&self, id: AlbumId) -> Result<Vec<TrackMeta>, CatalogError> {
        let state = self.shared.state();
        Ok(state
            .track_ids_of_album(id)
            .into_iter()
            .filter_map(|track_id| state.track_meta(track_id))
            .collect())
    }

    async fn add_album_with_tracks(
        &self,
        album: &NewAlbum,
        tracks: &[NewTrack],
    ) -> Result<AlbumId, CatalogError> {
        let mut tx = self.begin();
        let album_id = tx.insert_album(album)?;

        for track in tracks {
            let (track_id, payload) = tx.insert_track(track)?;
            tx.link(album_id, track_id)?;
            self.writer.record_add(&mut tx, track_id, payload).await?;
        }

        tx.commit()?;
        Ok(album_id)
    }

    async fn add_track_to_album(
        &self,
        album_id: AlbumId,
        track: &NewTrack,
    ) -> Result<TrackId, CatalogError> {
        let mut tx = self.begin();
        if !tx.view().albums.contains_key(&album_id) {
            return Err(CatalogError::AlbumNotFound(album_id));
        }

        let (track_id, payload) = tx.insert_track(track)?;
        tx.link(album_id, track_id)?;
        self.writer.record_add(&mut tx, track_id, payload).await?;

        tx.commit()?;
        Ok(track_id)
    }

    async fn delete_album(&self, id: AlbumId) -> Result<(), CatalogError> {
        let mut tx = self.begin();
        if !tx.view().albums.contains_key(&id) {
            return Err(CatalogError::AlbumNotFound(id));
        }

        let track_ids = tx.view().track_ids_of_album(id);
        for track_id in track_ids {
            tx.delete_track(track_id)?;
            self.writer.record_delete(&mut tx, track_id).await?;
        }
        tx.delete_album(id)?;

        tx.commit()?;
        Ok(())
    }

    async fn delete_track_from_album(
        &self,
        album_id: AlbumId,
        track_id: TrackId,
    ) -> Result<(), CatalogError> {
        let mut tx = self.begin();
        if !tx.view().albums.contains_key(&album_id) {
            return Err(CatalogError::AlbumNotFound(album_id));
        }
        if !tx.view().album_tracks.contains(&(album_id, track_id)) {
            return Err(CatalogError::TrackNotFound(track_id));
        }

        tx.delete_track(track_id)?;
        self.writer.record_delete(&mut tx, track_id).await?;

        if tx.view().track_ids_of_album(album_id).is_empty() {
            tx.delete_album(album_id)?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryCatalog {
    async fn select_pending(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError> {
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to select pending outbox records: connection refused",
            ));
        }

        Ok(self
            .shared
            .state()
            .outbox
            .values()
            .filter(|r| r.is_pending())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, ids: &[OutboxId]) -> Result<u64, DomainError> {
        if self.fail_next_mark_sent.swap(false, Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to mark outbox records sent: connection reset",
            ));
        }

        let mut state = self.shared.state();
        let mut flipped = 0;
        for id in ids {
            if let Some(record) = state.outbox.get_mut(id) {
                if record.is_pending() {
                    record.mark_sent();
                    flipped += 1;
                }
            }
        }
        Ok(flipped)
    }

    async fn count_pending(&self) -> Result<u64, DomainError> {
        Ok(self
            .shared
            .state()
            .outbox
            .values()
            .filter(|r| r.is_pending())
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use crate::domain::outbox::{Operation, TrackPayload};

    fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.add_genre("jazz");
        catalog.add_genre("rock");
        catalog
    }

    fn track(name: &str, genre: &str) -> NewTrack {
        NewTrack::new(format!("tracks/{name}.mp3"), name, genre).unwrap()
    }

    fn album() -> NewAlbum {
        NewAlbum::new("Kind of Blue", "LP").unwrap()
    }

    #[tokio::test]
    async fn add_album_records_one_add_per_track() {
        let catalog = catalog();

        let album_id = catalog
            .add_album_with_tracks(&album(), &[track("So What", "jazz"), track("Blue", "jazz")])
            .await
            .unwrap();

        let tracks = catalog.tracks_of_album(album_id).await.unwrap();
        let records = catalog.pending_records();
        assert_eq!(tracks.len(), 2);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.operation() == Operation::Add));
        assert_eq!(records[0].subject_id, tracks[0].id);
        assert_eq!(records[1].subject_id, tracks[1].id);
    }

    #[tokio::test]
    async fn unknown_genre_writes_nothing() {
        let catalog = catalog();

        let err = catalog
            .add_album_with_tracks(&album(), &[track("So What", "jazz"), track("X", "polka")])
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidGenre(ref g) if g == "polka"));
        assert_eq!(catalog.album_count(), 0);
        assert_eq!(catalog.track_count(), 0);
        assert!(catalog.records().is_empty());
    }

    #[tokio::test]
    async fn update_track_records_new_snapshot() {
        let catalog = catalog();
        let album_id = catalog
            .add_album_with_tracks(&album(), &[track("So What", "jazz")])
            .await
            .unwrap();
        let mut meta = catalog.tracks_of_album(album_id).await.unwrap().remove(0);

        meta.name = "So What (Live)".to_string();
        meta.genre = "rock".to_string();
        catalog.update_track(&meta).await.unwrap();

        let stored = catalog.get_track(meta.id).await.unwrap().unwrap();
        assert_eq!(stored, meta);

        let last = catalog.records().pop().unwrap();
        assert_eq!(last.operation(), Operation::Update);
        assert_eq!(
            last.change.payload(),
            Some(&TrackPayload {
                source: "tracks/So What.mp3".to_string(),
                name: "So What (Live)".to_string(),
                genre_id: Some(GenreId::new(2)),
            })
        );
    }

    #[tokio::test]
    async fn update_missing_track_fails() {
        let catalog = catalog();
        let meta = track("Ghost", "jazz").into_meta(TrackId::new(42));

        let err = catalog.update_track(&meta).await.unwrap_err();

        assert!(matches!(err, CatalogError::TrackNotFound(id) if id == TrackId::new(42)));
        assert!(catalog.records().is_empty());
    }

    #[tokio::test]
    async fn delete_album_records_delete_per_track() {
        let catalog = catalog();
        let album_id = catalog
            .add_album_with_tracks(&album(), &[track("A", "jazz"), track("B", "jazz")])
            .await
            .unwrap();

        catalog.delete_album(album_id).await.unwrap();

        assert_eq!(catalog.get_album(album_id).await.unwrap(), None);
        assert_eq!(catalog.track_count(), 0);
        let deletes = catalog
            .records()
            .into_iter()
            .filter(|r| r.operation() == Operation::Delete)
            .count();
        assert_eq!(deletes, 2);
    }

    #[tokio::test]
    async fn deleting_last_track_removes_album() {
        let catalog = catalog();
        let album_id = catalog
            .add_album_with_tracks(&album(), &[track("A", "jazz")])
            .await
            .unwrap();
        let second = catalog
            .add_track_to_album(album_id, &track("B", "jazz"))
            .await
            .unwrap();
        let first = TrackId::new(1);

        catalog.delete_track_from_album(album_id, first).await.unwrap();
        assert!(catalog.get_album(album_id).await.unwrap().is_some());

        catalog.delete_track_from_album(album_id, second).await.unwrap();
        assert!(catalog.get_album(album_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_track_to_missing_album_fails() {
        let catalog = catalog();

        let err = catalog
            .add_track_to_album(AlbumId::new(9), &track("A", "jazz"))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::AlbumNotFound(_)));
        assert_eq!(catalog.track_count(), 0);
    }

    #[tokio::test]
    async fn failed_outbox_insert_rolls_back_row_change() {
        let catalog = catalog();
        catalog.fail_next_outbox_insert();

        let err = catalog
            .add_album_with_tracks(&album(), &[track("A", "jazz")])
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert_eq!(catalog.album_count(), 0);
        assert_eq!(catalog.track_count(), 0);
        assert!(catalog.records().is_empty());
    }

    #[tokio::test]
    async fn failed_outbox_insert_names_the_record() {
        let catalog = catalog();
        let writer = EventWriter::default();
        let mut tx = catalog.begin();
        catalog.fail_next_outbox_insert();

        let err = writer.record_delete(&mut tx, TrackId::new(7)).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert_eq!(err.details.get("track_id"), Some(&"7".to_string()));
        assert!(err.details.contains_key("event_id"));
        assert!(tx.is_aborted());
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let catalog = catalog();
        let writer = EventWriter::default();

        {
            let mut tx = catalog.begin();
            let (track_id, payload) = tx.insert_track(&track("A", "jazz")).unwrap();
            writer.record_add(&mut tx, track_id, payload).await.unwrap();
        }

        assert_eq!(catalog.track_count(), 0);
        assert!(catalog.records().is_empty());
    }

    #[tokio::test]
    async fn aborted_transaction_cannot_commit() {
        let catalog = catalog();
        let mut tx = catalog.begin();
        tx.insert_track(&track("A", "jazz")).unwrap();

        tx.abort();
        assert!(tx.is_aborted());

        assert_eq!(tx.commit().unwrap_err().code, ErrorCode::TransactionAborted);
        assert_eq!(catalog.track_count(), 0);
    }

    #[tokio::test]
    async fn select_pending_is_ordered_and_capped() {
        let catalog = catalog();
        let tracks: Vec<_> = (0..5).map(|i| track(&format!("t{i}"), "jazz")).collect();
        catalog.add_album_with_tracks(&album(), &tracks).await.unwrap();

        let batch = catalog.select_pending(3).await.unwrap();

        let ids: Vec<u64> = batch.iter().map(|r| r.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn mark_sent_only_flips_pending_records() {
        let catalog = catalog();
        catalog
            .add_album_with_tracks(&album(), &[track("A", "jazz"), track("B", "jazz")])
            .await
            .unwrap();
        let first = [OutboxId::new(1)];

        assert_eq!(catalog.mark_sent(&first).await.unwrap(), 1);
        assert_eq!(catalog.mark_sent(&first).await.unwrap(), 0);
        assert_eq!(catalog.count_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn injected_fetch_failure_applies_once() {
        let catalog = catalog();
        catalog.fail_next_fetch();

        assert!(catalog.select_pending(10).await.is_err());
        assert!(catalog.select_pending(10).await.is_ok());
    }
}
