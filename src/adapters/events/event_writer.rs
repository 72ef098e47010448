//! EventWriter - Appends outbox records inside a caller's transaction.
//!
//! This is the first half of the Transactional Outbox Pattern:
//! 1. **A catalog mutation stages its row change and its outbox record in
//!    one storage transaction** ← This module
//! 2. The relay drains pending records to the broker
//!
//! The writer is a participant, never an owner: it does not begin, commit
//! or roll back. If it fails, the caller must abandon the whole transaction
//! so a catalog change can never commit without its event (or vice versa).
//!
//! # Example
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//!
//! delete_track_row(&mut tx, track_id).await?;
//! writer.record_delete(&mut tx, track_id).await?;
//!
//! tx.commit().await?;
//! ```

use std::sync::Arc;

use crate::domain::foundation::{DomainError, OutboxId, TrackId};
use crate::domain::outbox::{NewOutboxRecord, TrackChange, TrackPayload};
use crate::ports::{EventIdGenerator, OutboxTransaction, UuidEventIdGenerator};

/// Builds outbox records and inserts them through a transaction handle.
#[derive(Clone)]
pub struct EventWriter {
    ids: Arc<dyn EventIdGenerator>,
}

impl EventWriter {
    /// Create a writer with a custom id generator.
    pub fn new(ids: Arc<dyn EventIdGenerator>) -> Self {
        Self { ids }
    }

    /// Record that a track was added.
    pub async fn record_add(
        &self,
        tx: &mut (dyn OutboxTransaction + '_),
        subject_id: TrackId,
        payload: TrackPayload,
    ) -> Result<OutboxId, DomainError> {
        self.record(tx, subject_id, TrackChange::Added(payload)).await
    }

    /// Record that a track was updated.
    pub async fn record_update(
        &self,
        tx: &mut (dyn OutboxTransaction + '_),
        subject_id: TrackId,
        payload: TrackPayload,
    ) -> Result<OutboxId, DomainError> {
        self.record(tx, subject_id, TrackChange::Updated(payload)).await
    }

    /// Record that a track was deleted.
    pub async fn record_delete(
        &self,
        tx: &mut (dyn OutboxTransaction + '_),
        subject_id: TrackId,
    ) -> Result<OutboxId, DomainError> {
        self.record(tx, subject_id, TrackChange::Deleted).await
    }

    async fn record(
        &self,
        tx: &mut (dyn OutboxTransaction + '_),
        subject_id: TrackId,
        change: TrackChange,
    ) -> Result<OutboxId, DomainError> {
        let event_id = self.ids.generate()?;
        let record = NewOutboxRecord::new(event_id, subject_id, change);

        let id = tx.insert_outbox(&record).await?;

        tracing::debug!(
            outbox_id = %id,
            event_id = %record.event_id,
            subject_id = %subject_id,
            operation = %record.operation(),
            "Outbox record staged"
        );

        Ok(id)
    }
}

impl Default for EventWriter {
    fn default() -> Self {
        Self::new(Arc::new(UuidEventIdGenerator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ErrorCode, EventId, GenreId};
    use crate::domain::outbox::Operation;
    use async_trait::async_trait;

    /// Transaction double that keeps staged records in memory.
    struct RecordingTransaction {
        staged: Vec<NewOutboxRecord>,
        aborted: bool,
    }

    impl RecordingTransaction {
        fn new() -> Self {
            Self {
                staged: Vec::new(),
                aborted: false,
            }
        }
    }

    #[async_trait]
    impl OutboxTransaction for RecordingTransaction {
        async fn insert_outbox(
            &mut self,
            record: &NewOutboxRecord,
        ) -> Result<OutboxId, DomainError> {
            if self.aborted {
                return Err(DomainError::new(
                    ErrorCode::TransactionAborted,
                    "current transaction is aborted",
                ));
            }
            self.staged.push(record.clone());
            Ok(OutboxId::new(self.staged.len() as u64))
        }
    }

    struct FailingIds;

    impl EventIdGenerator for FailingIds {
        fn generate(&self) -> Result<EventId, DomainError> {
            Err(DomainError::new(
                ErrorCode::EventIdGeneration,
                "entropy source unavailable",
            ))
        }
    }

    fn payload() -> TrackPayload {
        TrackPayload {
            source: "tracks/1.mp3".to_string(),
            name: "Song".to_string(),
            genre_id: Some(GenreId::new(1)),
        }
    }

    #[tokio::test]
    async fn each_call_stages_exactly_one_record() {
        let writer = EventWriter::default();
        let mut tx = RecordingTransaction::new();

        writer.record_add(&mut tx, TrackId::new(1), payload()).await.unwrap();
        writer.record_update(&mut tx, TrackId::new(1), payload()).await.unwrap();
        writer.record_delete(&mut tx, TrackId::new(1)).await.unwrap();

        let ops: Vec<_> = tx.staged.iter().map(|r| r.operation()).collect();
        assert_eq!(ops, vec![Operation::Add, Operation::Update, Operation::Delete]);
    }

    #[tokio::test]
    async fn every_record_gets_a_fresh_event_id() {
        let writer = EventWriter::default();
        let mut tx = RecordingTransaction::new();

        writer.record_delete(&mut tx, TrackId::new(1)).await.unwrap();
        writer.record_delete(&mut tx, TrackId::new(1)).await.unwrap();

        assert_ne!(tx.staged[0].event_id, tx.staged[1].event_id);
    }

    #[tokio::test]
    async fn id_generation_failure_stages_nothing() {
        let writer = EventWriter::new(Arc::new(FailingIds));
        let mut tx = RecordingTransaction::new();

        let err = writer
            .record_add(&mut tx, TrackId::new(1), payload())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::EventIdGeneration);
        assert!(tx.staged.is_empty());
    }

    #[tokio::test]
    async fn aborted_transaction_is_reported() {
        let writer = EventWriter::default();
        let mut tx = RecordingTransaction::new();
        tx.aborted = true;

        let err = writer.record_delete(&mut tx, TrackId::new(1)).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::TransactionAborted);
    }
}
