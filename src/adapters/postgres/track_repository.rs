//! PostgreSQL implementation of TrackRepository.
//!
//! Also home of the track-row helpers the album repository reuses inside
//! its own transactions.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};

use crate::adapters::events::EventWriter;
use crate::domain::catalog::{CatalogError, NewTrack, TrackMeta};
use crate::domain::foundation::{DomainError, GenreId, TrackId};
use crate::domain::outbox::TrackPayload;
use crate::ports::TrackRepository;

/// PostgreSQL implementation of TrackRepository.
#[derive(Clone)]
pub struct PostgresTrackRepository {
    pool: PgPool,
    writer: EventWriter,
}

impl PostgresTrackRepository {
    pub fn new(pool: PgPool, writer: EventWriter) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl TrackRepository for PostgresTrackRepository {
    async fn get_track(&self, id: TrackId) -> Result<Option<TrackMeta>, CatalogError> {
        let row = sqlx::query(
            r#"
            SELECT t.id, t.source, t.name, COALESCE(g.name, '') AS genre
            FROM tracks t
            LEFT JOIN genres g ON g.id = t.genre_id
            WHERE t.id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch track", e))?;

        row.map(row_to_track).transpose().map_err(CatalogError::from)
    }

    async fn update_track(&self, track: &TrackMeta) -> Result<(), CatalogError> {
        track.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let genre_id = resolve_genre(&mut tx, &track.genre).await?;

        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                source = $2,
                name = $3,
                genre_id = $4
            WHERE id = $1
            "#,
        )
        .bind(track.id.as_i64())
        .bind(&track.source)
        .bind(&track.name)
        .bind(genre_id.as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update track", e))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::TrackNotFound(track.id));
        }

        let payload = TrackPayload {
            source: track.source.clone(),
            name: track.name.clone(),
            genre_id: Some(genre_id),
        };
        self.writer.record_update(&mut tx, track.id, payload).await?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit transaction", e))?;

        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Helper Functions
// ════════════════════════════════════════════════════════════════════════════════

/// Looks a genre up by name.
pub(super) async fn resolve_genre(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    name: &str,
) -> Result<GenreId, CatalogError> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM genres WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to resolve genre", e))?;

    id.map(GenreId::from_i64)
        .ok_or_else(|| CatalogError::invalid_genre(name))
}

/// Inserts a track row and returns its id with the outbox snapshot.
pub(super) async fn insert_track(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    track: &NewTrack,
) -> Result<(TrackId, TrackPayload), CatalogError> {
    let genre_id = resolve_genre(tx, &track.genre).await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO tracks (source, name, genre_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&track.source)
    .bind(&track.name)
    .bind(genre_id.as_i64())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| DomainError::database("Failed to insert track", e))?;

    let payload = TrackPayload {
        source: track.source.clone(),
        name: track.name.clone(),
        genre_id: Some(genre_id),
    };
    Ok((TrackId::from_i64(id), payload))
}

/// Deletes a track row; album links go with it.
pub(super) async fn delete_track(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: TrackId,
) -> Result<(), CatalogError> {
    let result = sqlx::query("DELETE FROM tracks WHERE id = $1")
        .bind(id.as_i64())
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database("Failed to delete track", e))?;

    if result.rows_affected() == 0 {
        return Err(CatalogError::TrackNotFound(id));
    }
    Ok(())
}

/// Expects columns `id`, `source`, `name` and `genre`.
pub(super) fn row_to_track(row: PgRow) -> Result<TrackMeta, DomainError> {
    let read = |e: sqlx::Error| DomainError::database("Failed to read track row", e);

    Ok(TrackMeta {
        id: TrackId::from_i64(row.try_get("id").map_err(read)?),
        source: row.try_get("source").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        genre: row.try_get("genre").map_err(read)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::postgres::test_support::{seed_genre, setup_test_db};
    use crate::adapters::postgres::PostgresOutboxStore;
    use crate::domain::outbox::Operation;
    use crate::ports::OutboxStore;

    async fn seed_track(pool: &PgPool, genre: &str) -> TrackId {
        let mut tx = pool.begin().await.unwrap();
        let track = NewTrack::new("tracks/1.mp3", "One", genre).unwrap();
        let (id, _) = insert_track(&mut tx, &track).await.unwrap();
        tx.commit().await.unwrap();
        id
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn update_writes_row_and_outbox_together() {
        let pool = setup_test_db().await;
        seed_genre(&pool, "jazz").await;
        seed_genre(&pool, "rock").await;
        let id = seed_track(&pool, "jazz").await;
        let repo = PostgresTrackRepository::new(pool.clone(), EventWriter::default());

        let mut meta = repo.get_track(id).await.unwrap().unwrap();
        meta.genre = "rock".to_string();
        repo.update_track(&meta).await.unwrap();

        assert_eq!(repo.get_track(id).await.unwrap().unwrap().genre, "rock");
        let pending = PostgresOutboxStore::new(pool).select_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation(), Operation::Update);
        assert_eq!(pending[0].subject_id, id);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn unknown_genre_rolls_back() {
        let pool = setup_test_db().await;
        seed_genre(&pool, "jazz").await;
        let id = seed_track(&pool, "jazz").await;
        let repo = PostgresTrackRepository::new(pool.clone(), EventWriter::default());

        let mut meta = repo.get_track(id).await.unwrap().unwrap();
        meta.genre = "polka".to_string();
        let err = repo.update_track(&meta).await.unwrap_err();

        assert!(matches!(err, CatalogError::InvalidGenre(_)));
        let store = PostgresOutboxStore::new(pool);
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn update_of_missing_track_writes_no_event() {
        let pool = setup_test_db().await;
        seed_genre(&pool, "jazz").await;
        let repo = PostgresTrackRepository::new(pool.clone(), EventWriter::default());
        let meta = NewTrack::new("tracks/x.mp3", "X", "jazz")
            .unwrap()
            .into_meta(TrackId::new(999));

        let err = repo.update_track(&meta).await.unwrap_err();

        assert!(matches!(err, CatalogError::TrackNotFound(_)));
        let store = PostgresOutboxStore::new(pool);
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }
}
