//! In-memory catalog adapters for tests and local runs.

mod catalog;
mod transaction;

pub use catalog::InMemoryCatalog;
pub use transaction::InMemoryTransaction;
