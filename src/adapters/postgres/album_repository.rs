//! PostgreSQL implementation of AlbumRepository.
//!
//! Every mutation runs in one transaction covering the album rows, the
//! track rows and one outbox record per affected track.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row};

use super::track_repository::{delete_track, insert_track, row_to_track};
use crate::adapters::events::EventWriter;
use crate::domain::catalog::{Album, CatalogError, NewAlbum, NewTrack, TrackMeta};
use crate::domain::foundation::{AlbumId, DomainError, TrackId};
use crate::ports::AlbumRepository;

/// PostgreSQL implementation of AlbumRepository.
#[derive(Clone)]
pub struct PostgresAlbumRepository {
    pool: PgPool,
    writer: EventWriter,
}

impl PostgresAlbumRepository {
    pub fn new(pool: PgPool, writer: EventWriter) -> Self {
        Self { pool, writer }
    }

    async fn begin(&self) -> Result<sqlx::Transaction<'static, Postgres>, DomainError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))
    }
}

#[async_trait]
impl AlbumRepository for PostgresAlbumRepository {
    async fn get_album(&self, id: AlbumId) -> Result<Option<Album>, CatalogError> {
        let row = sqlx::query("SELECT id, name, kind FROM albums WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to fetch album", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let read = |e: sqlx::Error| DomainError::database("Failed to read album row", e);
        Ok(Some(Album {
            id: AlbumId::from_i64(row.try_get("id").map_err(read)?),
            name: row.try_get("name").map_err(read)?,
            kind: row.try_get("kind").map_err(read)?,
        }))
    }

    async fn tracks_of_album(&self, id: AlbumId) -> Result<Vec<TrackMeta>, CatalogError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.source, t.name, COALESCE(g.name, '') AS genre
            FROM album_tracks at
            JOIN tracks t ON t.id = at.track_id
            LEFT JOIN genres g ON g.id = t.genre_id
            WHERE at.album_id = $1
            ORDER BY t.id ASC
            "#,
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch album tracks", e))?;

        rows.into_iter()
            .map(row_to_track)
            .collect::<Result<Vec<_>, _>>()
            .map_err(CatalogError::from)
    }

    async fn add_album_with_tracks(
        &self,
        album: &NewAlbum,
        tracks: &[NewTrack],
    ) -> Result<AlbumId, CatalogError> {
        let mut tx = self.begin().await?;

        let album_id: i64 =
            sqlx::query_scalar("INSERT INTO albums (name, kind) VALUES ($1, $2) RETURNING id")
                .bind(&album.name)
                .bind(&album.kind)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to insert album", e))?;
        let album_id = AlbumId::from_i64(album_id);

        for track in tracks {
            let (track_id, payload) = insert_track(&mut tx, track).await?;
            link(&mut tx, album_id, track_id).await?;
            self.writer.record_add(&mut tx, track_id, payload).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        tracing::debug!(album_id = %album_id, tracks = tracks.len(), "Album stored");
        Ok(album_id)
    }

    async fn add_track_to_album(
        &self,
        album_id: AlbumId,
        track: &NewTrack,
    ) -> Result<TrackId, CatalogError> {
        let mut tx = self.begin().await?;
        lock_album(&mut tx, album_id).await?;

        let (track_id, payload) = insert_track(&mut tx, track).await?;
        link(&mut tx, album_id, track_id).await?;
        self.writer.record_add(&mut tx, track_id, payload).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(track_id)
    }

    async fn delete_album(&self, id: AlbumId) -> Result<(), CatalogError> {
        let mut tx = self.begin().await?;
        lock_album(&mut tx, id).await?;

        let track_ids = album_track_ids(&mut tx, id).await?;
        for track_id in track_ids {
            delete_track(&mut tx, track_id).await?;
            self.writer.record_delete(&mut tx, track_id).await?;
        }

        sqlx::query("DELETE FROM albums WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to delete album", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(())
    }

    async fn delete_track_from_album(
        &self,
        album_id: AlbumId,
        track_id: TrackId,
    ) -> Result<(), CatalogError> {
        let mut tx = self.begin().await?;
        lock_album(&mut tx, album_id).await?;

        let linked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM album_tracks WHERE album_id = $1 AND track_id = $2)",
        )
        .bind(album_id.as_i64())
        .bind(track_id.as_i64())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to check album track", e))?;
        if !linked {
            return Err(CatalogError::TrackNotFound(track_id));
        }

        delete_track(&mut tx, track_id).await?;
        self.writer.record_delete(&mut tx, track_id).await?;

        let remaining = album_track_ids(&mut tx, album_id).await?;
        if remaining.is_empty() {
            sqlx::query("DELETE FROM albums WHERE id = $1")
                .bind(album_id.as_i64())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to delete empty album", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Helper Functions
// ════════════════════════════════════════════════════════════════════════════════

/// Row-locks the album for the rest of the transaction.
async fn lock_album(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: AlbumId,
) -> Result<(), CatalogError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM albums WHERE id = $1 FOR UPDATE")
        .bind(id.as_i64())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to lock album", e))?;

    found.map(|_| ()).ok_or(CatalogError::AlbumNotFound(id))
}

async fn link(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    album_id: AlbumId,
    track_id: TrackId,
) -> Result<(), DomainError> {
    sqlx::query("INSERT INTO album_tracks (album_id, track_id) VALUES ($1, $2)")
        .bind(album_id.as_i64())
        .bind(track_id.as_i64())
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to link track to album", e))?;

    Ok(())
}

async fn album_track_ids(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    album_id: AlbumId,
) -> Result<Vec<TrackId>, DomainError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT track_id FROM album_tracks WHERE album_id = $1 ORDER BY track_id ASC",
    )
    .bind(album_id.as_i64())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to list album tracks", e))?;

    Ok(ids.into_iter().map(TrackId::from_i64).collect())
}
