//! EventIdGenerator port - Source of idempotency keys.

use crate::domain::foundation::{DomainError, EventId};

/// Produces collision-free event ids.
///
/// Generation is fallible so an exhausted or broken source aborts the
/// business transaction instead of writing a record without a key.
pub trait EventIdGenerator: Send + Sync {
    fn generate(&self) -> Result<EventId, DomainError>;
}

/// UUID v4 generator backed by the `uuid` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidEventIdGenerator;

impl EventIdGenerator for UuidEventIdGenerator {
    fn generate(&self) -> Result<EventId, DomainError> {
        Ok(EventId::new())
    }
}
