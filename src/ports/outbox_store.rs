//! Outbox storage ports.
//!
//! The outbox table is shared state between two parties:
//!
//! 1. Catalog mutations append records through an [`OutboxTransaction`],
//!    the handle of the business transaction they are already running in.
//! 2. The relay reads pending records and flips them to sent through an
//!    [`OutboxStore`], outside any business transaction.
//!
//! The write side never commits on its own; a record becomes visible only
//! when the enclosing transaction commits, and disappears with it on rollback.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OutboxId};
use crate::domain::outbox::{NewOutboxRecord, OutboxRecord};

/// A storage transaction that can carry outbox inserts.
///
/// Implementations must fail once the transaction is no longer usable
/// (for example after an earlier statement failed), so the caller aborts
/// instead of committing a half-written business operation.
///
/// # Example
///
/// ```ignore
/// let mut tx = pool.begin().await?;
///
/// update_track_row(&mut tx, &track).await?;
/// writer.record_update(&mut tx, track.id, payload).await?;
///
/// tx.commit().await?;
/// ```
#[async_trait]
pub trait OutboxTransaction: Send {
    /// Insert one record, returning the storage-assigned id.
    async fn insert_outbox(&mut self, record: &NewOutboxRecord) -> Result<OutboxId, DomainError>;
}

/// Relay-side access to the outbox table.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Get up to `limit` pending records, ordered by id ascending.
    async fn select_pending(&self, limit: u32) -> Result<Vec<OutboxRecord>, DomainError>;

    /// Flip exactly the given records to sent, in one statement.
    ///
    /// Records already sent are left untouched. Returns the number of
    /// records that changed state.
    async fn mark_sent(&self, ids: &[OutboxId]) -> Result<u64, DomainError>;

    /// Number of records still waiting for publication.
    async fn count_pending(&self) -> Result<u64, DomainError>;
}
