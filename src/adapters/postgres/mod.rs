//! PostgreSQL adapters - sqlx implementations of the catalog and outbox ports.

mod album_repository;
mod outbox_store;
mod pool;
mod track_repository;

pub use album_repository::PostgresAlbumRepository;
pub use outbox_store::PostgresOutboxStore;
pub use pool::{connect, run_migrations};
pub use track_repository::PostgresTrackRepository;
