//! Nimbus sync daemon.
//!
//! Loads the configured cloud set, runs the sync manager until a
//! shutdown signal arrives, and logs catalog updates as they land.

use std::sync::Arc;

use anyhow::Context;
use nimbus_core::SyncManager;
use nimbus_infra::{HttpAuthConnector, HttpEntityClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = nimbus_infra::load().context("failed to load configuration")?;
    info!(clouds = config.clouds.len(), "starting nimbus sync daemon");

    let manager = Arc::new(SyncManager::new(
        Arc::new(HttpEntityClient::new().context("failed to build entity client")?),
        Arc::new(HttpAuthConnector::new().context("failed to build auth connector")?),
        config.settings,
    ));
    manager.update_clouds(config.clouds).await;

    let catalog = manager.catalog();
    let mut updates = catalog.subscribe();
    let stats = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let entities = updates.borrow().len();
            info!(entities, "catalog updated");
        }
    });

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("shutdown signal received; stopping cloud sync");

    manager.shutdown().await;
    stats.abort();

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
