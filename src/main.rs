//! catalog-outbox-relay - Publishes pending outbox records to Redis Streams.
//!
//! Configuration comes from `CATALOG_OUTBOX__*` environment variables (see
//! [`catalog_outbox::config`]). The relay runs until Ctrl-C; the batch in
//! flight at that moment is finished before exit.

use std::sync::Arc;

use tokio::sync::watch;

use catalog_outbox::adapters::postgres::{self, PostgresOutboxStore};
use catalog_outbox::adapters::{OutboxRelay, OutboxRelayConfig, RedisStreamPublisher};
use catalog_outbox::config::AppConfig;
use catalog_outbox::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_validated()?;
    telemetry::init_tracing(&config.telemetry)?;

    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
    }

    if config.broker.min_replicas == 0 {
        tracing::warn!("broker.min_replicas is 0, batches are confirmed by the primary alone");
    }

    let store = Arc::new(PostgresOutboxStore::new(pool));
    let broker = Arc::new(RedisStreamPublisher::connect(&config.broker).await?);
    let relay = OutboxRelay::with_config(store, broker, OutboxRelayConfig::from(&config.relay));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(async move { relay.run(shutdown_rx).await });

    wait_for_shutdown().await;
    let _ = shutdown_tx.send(true);
    worker.await?;

    Ok(())
}

/// Wait for Ctrl+C.
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down gracefully...");
}
