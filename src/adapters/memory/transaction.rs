//! Buffered transaction over the in-memory catalog state.
//!
//! A transaction works on a private copy of the state taken at `begin` and
//! keeps a log of its writes. `commit` replays the log onto the shared state
//! under one lock, so other readers see all of it or none of it. Dropping an
//! uncommitted transaction discards the log.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::catalog::{Album, CatalogError, NewAlbum, NewTrack, TrackMeta};
use crate::domain::foundation::{
    AlbumId, DomainError, ErrorCode, GenreId, OutboxId, TrackId,
};
use crate::domain::outbox::{NewOutboxRecord, OutboxRecord, TrackPayload};
use crate::ports::OutboxTransaction;

/// Stored track columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TrackRow {
    pub source: String,
    pub name: String,
    pub genre_id: Option<GenreId>,
}

impl TrackRow {
    fn payload(&self) -> TrackPayload {
        TrackPayload {
            source: self.source.clone(),
            name: self.name.clone(),
            genre_id: self.genre_id,
        }
    }
}

/// Tables of the in-memory catalog.
#[derive(Debug, Clone, Default)]
pub(super) struct CatalogState {
    pub genres: BTreeMap<GenreId, String>,
    pub tracks: BTreeMap<TrackId, TrackRow>,
    pub albums: BTreeMap<AlbumId, Album>,
    pub album_tracks: BTreeSet<(AlbumId, TrackId)>,
    pub outbox: BTreeMap<OutboxId, OutboxRecord>,
}

impl CatalogState {
    pub fn genre_by_name(&self, name: &str) -> Option<GenreId> {
        self.genres
            .iter()
            .find(|(_, genre)| genre.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn track_meta(&self, id: TrackId) -> Option<TrackMeta> {
        let row = self.tracks.get(&id)?;
        let genre = row
            .genre_id
            .and_then(|g| self.genres.get(&g).cloned())
            .unwrap_or_default();
        Some(TrackMeta {
            id,
            source: row.source.clone(),
            name: row.name.clone(),
            genre,
        })
    }

    pub fn track_ids_of_album(&self, album_id: AlbumId) -> Vec<TrackId> {
        self.album_tracks
            .range((album_id, TrackId::new(0))..=(album_id, TrackId::new(u64::MAX)))
            .map(|(_, track_id)| *track_id)
            .collect()
    }

    fn apply(&mut self, write: &Write) {
        match write {
            Write::PutTrack(id, row) => {
                self.tracks.insert(*id, row.clone());
            }
            Write::DeleteTrack(id) => {
                self.tracks.remove(id);
                self.album_tracks.retain(|(_, track_id)| track_id != id);
            }
            Write::PutAlbum(album) => {
                self.albums.insert(album.id, album.clone());
            }
            Write::DeleteAlbum(id) => {
                self.albums.remove(id);
                self.album_tracks.retain(|(album_id, _)| album_id != id);
            }
            Write::Link(album_id, track_id) => {
                self.album_tracks.insert((*album_id, *track_id));
            }
            Write::InsertOutbox(record) => {
                self.outbox.insert(record.id, record.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Write {
    PutTrack(TrackId, TrackRow),
    DeleteTrack(TrackId),
    PutAlbum(Album),
    DeleteAlbum(AlbumId),
    Link(AlbumId, TrackId),
    InsertOutbox(OutboxRecord),
}

/// State and sequences shared by a catalog and its transactions.
#[derive(Debug, Default)]
pub(super) struct Shared {
    state: Mutex<CatalogState>,
    track_seq: AtomicU64,
    album_seq: AtomicU64,
    genre_seq: AtomicU64,
    outbox_seq: AtomicU64,
    pub fail_next_outbox_insert: AtomicBool,
}

impl Shared {
    pub fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn next_genre_id(&self) -> GenreId {
        GenreId::new(self.genre_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_track_id(&self) -> TrackId {
        TrackId::new(self.track_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_album_id(&self) -> AlbumId {
        AlbumId::new(self.album_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn next_outbox_id(&self) -> OutboxId {
        OutboxId::new(self.outbox_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// An open transaction on an [`InMemoryCatalog`](super::InMemoryCatalog).
///
/// Ids are drawn from shared sequences when a row is staged, so a rolled
/// back transaction leaves gaps, as a database sequence would.
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    working: CatalogState,
    log: Vec<Write>,
    aborted: bool,
}

impl InMemoryTransaction {
    pub(super) fn begin(shared: Arc<Shared>) -> Self {
        let working = shared.state().clone();
        Self {
            shared,
            working,
            log: Vec::new(),
            aborted: false,
        }
    }

    /// Put the transaction in the failed state, as a failing statement
    /// would. Every later statement and the commit are refused.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Apply all staged writes atomically.
    pub fn commit(self) -> Result<(), DomainError> {
        self.ensure_open()?;

        let mut state = self.shared.state();
        for write in &self.log {
            if let Write::InsertOutbox(record) = write {
                if state.outbox.values().any(|r| r.event_id == record.event_id) {
                    return Err(DomainError::new(
                        ErrorCode::DatabaseError,
                        format!(
                            "duplicate key value violates unique constraint outbox_event_id_key ({})",
                            record.event_id
                        ),
                    ));
                }
            }
        }
        for write in &self.log {
            state.apply(write);
        }
        Ok(())
    }

    /// Discard all staged writes.
    pub fn rollback(self) {}

    /// Stage a new track row, resolving its genre by name.
    pub fn insert_track(
        &mut self,
        track: &NewTrack,
    ) -> Result<(TrackId, TrackPayload), CatalogError> {
        self.ensure_open()?;
        let genre_id = self.resolve_genre(&track.genre)?;
        let id = self.shared.next_track_id();
        let row = TrackRow {
            source: track.source.clone(),
            name: track.name.clone(),
            genre_id: Some(genre_id),
        };
        let payload = row.payload();
        self.stage(Write::PutTrack(id, row));
        Ok((id, payload))
    }

    /// Stage new column values for an existing track.
    pub fn update_track(&mut self, track: &TrackMeta) -> Result<TrackPayload, CatalogError> {
        self.ensure_open()?;
        let genre_id = self.resolve_genre(&track.genre)?;
        if !self.working.tracks.contains_key(&track.id) {
            return Err(CatalogError::TrackNotFound(track.id));
        }
        let row = TrackRow {
            source: track.source.clone(),
            name: track.name.clone(),
            genre_id: Some(genre_id),
        };
        let payload = row.payload();
        self.stage(Write::PutTrack(track.id, row));
        Ok(payload)
    }

    /// Stage removal of a track and its album links.
    pub fn delete_track(&mut self, id: TrackId) -> Result<(), CatalogError> {
        self.ensure_open()?;
        if !self.working.tracks.contains_key(&id) {
            return Err(CatalogError::TrackNotFound(id));
        }
        self.stage(Write::DeleteTrack(id));
        Ok(())
    }

    pub(super) fn insert_album(&mut self, album: &NewAlbum) -> Result<AlbumId, CatalogError> {
        self.ensure_open()?;
        let id = self.shared.next_album_id();
        self.stage(Write::PutAlbum(Album {
            id,
            name: album.name.clone(),
            kind: album.kind.clone(),
        }));
        Ok(id)
    }

    pub(super) fn delete_album(&mut self, id: AlbumId) -> Result<(), CatalogError> {
        self.ensure_open()?;
        self.stage(Write::DeleteAlbum(id));
        Ok(())
    }

    pub(super) fn link(&mut self, album_id: AlbumId, track_id: TrackId) -> Result<(), CatalogError> {
        self.ensure_open()?;
        self.stage(Write::Link(album_id, track_id));
        Ok(())
    }

    pub(super) fn view(&self) -> &CatalogState {
        &self.working
    }

    fn resolve_genre(&self, name: &str) -> Result<GenreId, CatalogError> {
        self.working
            .genre_by_name(name)
            .ok_or_else(|| CatalogError::invalid_genre(name))
    }

    fn stage(&mut self, write: Write) {
        self.working.apply(&write);
        self.log.push(write);
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.aborted {
            return Err(DomainError::new(
                ErrorCode::TransactionAborted,
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboxTransaction for InMemoryTransaction {
    async fn insert_outbox(&mut self, record: &NewOutboxRecord) -> Result<OutboxId, DomainError> {
        self.ensure_open()?;

        if self
            .shared
            .fail_next_outbox_insert
            .swap(false, Ordering::SeqCst)
        {
            self.abort();
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "Failed to insert outbox record: connection reset",
            )
            .with_detail("event_id", record.event_id.as_str())
            .with_detail("track_id", record.subject_id.to_string()));
        }

        if self
            .working
            .outbox
            .values()
            .any(|r| r.event_id == record.event_id)
        {
            self.abort();
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!(
                    "duplicate key value violates unique constraint outbox_event_id_key ({})",
                    record.event_id
                ),
            )
            .with_detail("event_id", record.event_id.as_str())
            .with_detail("track_id", record.subject_id.to_string()));
        }

        let id = self.shared.next_outbox_id();
        self.stage(Write::InsertOutbox(record.clone().into_record(id)));
        Ok(id)
    }
}
