//! # axlinkd
//!
//! Composition root that wires the adapters together and hosts the axis
//! config entries.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Seed the entries declared in the config file
//! - Construct the entry controller, injecting adapters via port traits
//! - Load every stored entry, then process inbox commands and retries
//! - Stop every entry on SIGINT
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; lifecycle logic belongs to `axlink-app`.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use axlink_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteDeviceRepository, SqliteEntryStore,
};
use axlink_adapter_virtual::VirtualConnector;
use axlink_app::controller::EntryController;
use axlink_app::event_bus::InProcessEventBus;
use axlink_app::inbox;
use axlink_app::platforms::InProcessPlatforms;
use axlink_app::services::device_service::DeviceService;
use axlinkd::config::Config;
use axlinkd::runtime::{Backoff, Host, seed_entries};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Adapters
    let store = SqliteEntryStore::new(pool.clone());
    let devices = DeviceService::new(SqliteDeviceRepository::new(pool));
    let connector = VirtualConnector::new(config.devices);
    let platforms = Arc::new(InProcessPlatforms::new());
    let bus = Arc::new(InProcessEventBus::new(256));

    let added = seed_entries(&store, config.entries).await?;
    if added > 0 {
        tracing::info!(added, "seeded entries from config");
    }

    // Integration
    let (commands_tx, commands_rx) = inbox::channel();
    let controller = EntryController::new(
        connector,
        devices,
        platforms,
        Arc::clone(&bus),
        store.clone(),
        commands_tx,
    );

    let mut host = Host::new(
        controller,
        bus,
        store,
        commands_rx,
        Backoff::from(config.retry),
    );
    host.start().await?;

    host.run(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for shutdown signal");
        }
    })
    .await;

    Ok(())
}
