//! PostgreSQL implementation of the outbox ports.
//!
//! `sqlx::Transaction` is itself the [`OutboxTransaction`]: catalog
//! repositories hand their open transaction to the `EventWriter`, so the
//! outbox insert commits or rolls back with the row change.
//!
//! [`PostgresOutboxStore`] is the relay side. Each method is one statement
//! on the pool; the relay never holds a transaction across a publish.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};

use crate::domain::foundation::{
    DomainError, EventId, GenreId, OutboxId, Timestamp, TrackId,
};
use crate::domain::outbox::{
    NewOutboxRecord, Operation, OutboxRecord, OutboxStatus, TrackChange, TrackPayload,
};
use crate::ports::{OutboxStore, OutboxTransaction};

#[async_trait]
impl<'c> OutboxTransaction for sqlx::Transaction<'c, Postgres> {
    async fn insert_outbox(&mut self, record: &NewOutboxRecord) -> Result<OutboxId, DomainError> {
        let payload = record.change.payload();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO outbox (
                event_id, track_id, operation, source, name, genre_id, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(record.subject_id.as_i64())
        .bind(record.operation().as_str())
        .bind(payload.map(|p| p.source.as_str()))
        .bind(payload.map(|p| p.name.as_str()))
        .bind(payload.and_then(|p| p.genre_id).map(|g| g.as_i64()))
        .bind(OutboxStatus::Pending.as_str())
        .bind(record.created_at.as_datetime())
        .fetch_one(&mut **self)
        .await
        .map_err(|e| {
            DomainError::database("Failed to insert outbox record", e)
                .with_detail("event_id", record.event_id.as_str())
                .with_detail("track_id", record.subject_id.to_string())
        })?;

        Ok(OutboxId::from_i64(id))
    }
}

/// PostgreSQL implementation of OutboxStore.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn select_pending(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, track_id, operation, source, name, genre_id, status, created_at
            FROM outbox
            WHERE status = 'pending'
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to select pending outbox records", e))?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn mark_sent(&self, ids: &[OutboxId]) -> Result<u64, DomainError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();

        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'sent', sent_at = NOW()
            WHERE id = ANY($1) AND status = 'pending'
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database("Failed to mark outbox records sent", e)
                .with_detail("batch_size", ids.len().to_string())
        })?;

        Ok(result.rows_affected())
    }

    async fn count_pending(&self) -> Result<u64, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to count pending outbox records", e))?;

        Ok(count.max(0) as u64)
    }
}

fn row_to_record(row: PgRow) -> Result<OutboxRecord, DomainError> {
    let read = |e: sqlx::Error| DomainError::database("Failed to read outbox row", e);

    let operation: Operation = row.try_get::<String, _>("operation").map_err(read)?.parse()?;
    let status: OutboxStatus = row.try_get::<String, _>("status").map_err(read)?.parse()?;

    let source: Option<String> = row.try_get("source").map_err(read)?;
    let name: Option<String> = row.try_get("name").map_err(read)?;
    let genre_id: Option<i64> = row.try_get("genre_id").map_err(read)?;
    let payload = match (source, name) {
        (Some(source), Some(name)) => Some(TrackPayload {
            source,
            name,
            genre_id: genre_id.map(GenreId::from_i64),
        }),
        _ => None,
    };

    Ok(OutboxRecord {
        id: OutboxId::from_i64(row.try_get("id").map_err(read)?),
        event_id: EventId::from_string(row.try_get::<String, _>("event_id").map_err(read)?),
        subject_id: TrackId::from_i64(row.try_get("track_id").map_err(read)?),
        change: TrackChange::from_parts(operation, payload)?,
        status,
        created_at: Timestamp::from_datetime(row.try_get("created_at").map_err(read)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::EventWriter;
    use crate::adapters::postgres::test_support::setup_test_db;

    async fn stage_deletes(pool: &PgPool, subjects: &[u64]) {
        let writer = EventWriter::default();
        let mut tx = pool.begin().await.unwrap();
        for subject in subjects {
            writer
                .record_delete(&mut tx, TrackId::new(*subject))
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn insert_is_invisible_until_commit() {
        let pool = setup_test_db().await;
        let store = PostgresOutboxStore::new(pool.clone());
        let writer = EventWriter::default();

        let mut tx = pool.begin().await.unwrap();
        writer.record_delete(&mut tx, TrackId::new(1)).await.unwrap();
        assert_eq!(store.count_pending().await.unwrap(), 0);

        tx.rollback().await.unwrap();
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn select_pending_is_oldest_first_and_capped() {
        let pool = setup_test_db().await;
        let store = PostgresOutboxStore::new(pool.clone());
        stage_deletes(&pool, &[5, 4, 3]).await;

        let batch = store.select_pending(2).await.unwrap();

        let subjects: Vec<u64> = batch.iter().map(|r| r.subject_id.value()).collect();
        assert_eq!(subjects, vec![5, 4]);
        assert!(batch[0].id < batch[1].id);
        assert!(batch.iter().all(|r| r.operation() == Operation::Delete));
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn mark_sent_is_idempotent() {
        let pool = setup_test_db().await;
        let store = PostgresOutboxStore::new(pool.clone());
        stage_deletes(&pool, &[1, 2]).await;
        let ids: Vec<OutboxId> = store
            .select_pending(10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();

        assert_eq!(store.mark_sent(&ids[..1]).await.unwrap(), 1);
        assert_eq!(store.mark_sent(&ids).await.unwrap(), 1);
        assert_eq!(store.mark_sent(&ids).await.unwrap(), 0);
        assert_eq!(store.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL"]
    async fn payload_columns_round_trip() {
        let pool = setup_test_db().await;
        let store = PostgresOutboxStore::new(pool.clone());
        let writer = EventWriter::default();
        let payload = TrackPayload {
            source: "tracks/7.mp3".to_string(),
            name: "Seven".to_string(),
            genre_id: None,
        };

        let mut tx = pool.begin().await.unwrap();
        writer
            .record_add(&mut tx, TrackId::new(7), payload.clone())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let record = store.select_pending(1).await.unwrap().remove(0);
        assert_eq!(record.change, TrackChange::Added(payload));
        assert!(record.is_pending());
    }
}
