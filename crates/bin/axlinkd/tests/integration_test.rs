//! End-to-end tests for the full axlinkd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, real store
//! and repositories, real controller, virtual devices) into a [`Host`] and
//! drives it one step at a time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use axlink_adapter_storage_sqlite_sqlx::{Config, SqliteDeviceRepository, SqliteEntryStore};
use axlink_adapter_virtual::{VirtualConnector, VirtualDeviceConfig};
use axlink_app::controller::EntryController;
use axlink_app::event_bus::InProcessEventBus;
use axlink_app::inbox;
use axlink_app::platforms::InProcessPlatforms;
use axlink_app::ports::{DeviceRepository, EntryStore};
use axlink_app::services::device_service::DeviceService;
use axlink_domain::entry::{ConfiguredEntry, EntryState, PLATFORMS, Payload};
use axlink_domain::event::{DeviceEvent, EventType};
use axlink_domain::migration::TARGET_VERSION;
use axlinkd::config::EntrySeed;
use axlinkd::runtime::{Backoff, Host, seed_entries};

type Controller = EntryController<
    Arc<VirtualConnector>,
    DeviceService<SqliteDeviceRepository>,
    Arc<InProcessPlatforms>,
    Arc<InProcessEventBus>,
    SqliteEntryStore,
>;

const SERIAL: &str = "accc8e112233";

struct Stack {
    host: Host<Controller, Arc<InProcessEventBus>, SqliteEntryStore>,
    store: SqliteEntryStore,
    devices: SqliteDeviceRepository,
    connector: Arc<VirtualConnector>,
    platforms: Arc<InProcessPlatforms>,
    bus: Arc<InProcessEventBus>,
}

impl Stack {
    async fn new(devices: Vec<VirtualDeviceConfig>, entries: Vec<ConfiguredEntry>) -> Self {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .expect("in-memory database should initialise");
        let pool = db.pool().clone();

        let store = SqliteEntryStore::new(pool.clone());
        for entry in entries {
            store.insert(entry).await.unwrap();
        }

        let connector = Arc::new(VirtualConnector::new(devices));
        let platforms = Arc::new(InProcessPlatforms::new());
        let bus = Arc::new(InProcessEventBus::new(64));
        let (commands_tx, commands_rx) = inbox::channel();

        let controller = EntryController::new(
            Arc::clone(&connector),
            DeviceService::new(SqliteDeviceRepository::new(pool.clone())),
            Arc::clone(&platforms),
            Arc::clone(&bus),
            store.clone(),
            commands_tx,
        );
        let backoff = Backoff {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(40),
        };
        let host = Host::new(
            controller,
            Arc::clone(&bus),
            store.clone(),
            commands_rx,
            backoff,
        );

        Self {
            host,
            store,
            devices: SqliteDeviceRepository::new(pool),
            connector,
            platforms,
            bus,
        }
    }

    /// Process the next command or retry, failing the test if nothing
    /// arrives in time.
    async fn step(&mut self) {
        tokio::time::timeout(Duration::from_secs(2), self.host.step())
            .await
            .expect("host should have work pending");
    }
}

fn garage() -> VirtualDeviceConfig {
    VirtualDeviceConfig {
        host: "10.0.0.5".to_string(),
        serial: SERIAL.to_string(),
        model: "P1448-LE".to_string(),
        name: "Garage".to_string(),
        firmware: Some("11.9.60".to_string()),
        username: "root".to_string(),
        password: "pass".to_string(),
        reachable: true,
    }
}

fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn current_entry(password: &str) -> ConfiguredEntry {
    ConfiguredEntry::new(
        "Garage camera",
        TARGET_VERSION,
        payload(json!({
            "host": "10.0.0.5",
            "username": "root",
            "password": password,
        })),
    )
}

fn legacy_entry() -> ConfiguredEntry {
    ConfiguredEntry::new(
        "Garage camera",
        1,
        payload(json!({
            "device": {
                "address": "10.0.0.5",
                "username": "root",
                "password": "pass",
                "mac": "AC-CC-8E-11-22-33",
            }
        })),
    )
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_migrate_and_load_legacy_entry() {
    let entry = legacy_entry();
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;

    assert_eq!(stack.host.start().await.unwrap(), 1);

    assert_eq!(stack.host.state(entry.id), EntryState::Loaded);
    let stored = stack.store.read(entry.id).await.unwrap();
    assert_eq!(stored.version, TARGET_VERSION);
    assert_eq!(stored.payload["host"], "10.0.0.5");
    assert_eq!(stored.payload["mac"], "ac:cc:8e:11:22:33");
    assert_eq!(stored.payload["password"], "pass");

    let devices = stack.devices.get_all().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].unique_id, SERIAL);
    assert_eq!(devices[0].entry_id, entry.id);
    assert_eq!(stack.platforms.loaded(entry.id), PLATFORMS.to_vec());
}

#[tokio::test]
async fn should_refuse_entry_from_newer_build() {
    let mut entry = current_entry("pass");
    entry.version = TARGET_VERSION + 1;
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;

    stack.host.start().await.unwrap();

    assert_eq!(stack.host.state(entry.id), EntryState::MigrationError);
    assert_eq!(stack.store.read(entry.id).await.unwrap(), entry);
    assert!(stack.connector.session(SERIAL).is_none());
    assert!(stack.host.hubs().is_empty().await);
}

#[tokio::test]
async fn should_stop_on_rejected_credentials() {
    let entry = current_entry("wrong");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;

    stack.host.start().await.unwrap();

    assert_eq!(stack.host.state(entry.id), EntryState::SetupError);
    let idle = tokio::time::timeout(Duration::from_millis(100), stack.host.step()).await;
    assert!(idle.is_err(), "no retry should be scheduled");
    assert!(stack.devices.get_all().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_retry_unreachable_device_until_it_answers() {
    let entry = current_entry("pass");
    let mut device = garage();
    device.reachable = false;
    let mut stack = Stack::new(vec![device], vec![entry.clone()]).await;

    stack.host.start().await.unwrap();
    assert_eq!(stack.host.state(entry.id), EntryState::SetupRetry);

    stack.step().await;
    assert_eq!(stack.host.state(entry.id), EntryState::SetupRetry);

    stack.connector.set_reachable("10.0.0.5", true);
    stack.step().await;

    assert_eq!(stack.host.state(entry.id), EntryState::Loaded);
    assert!(stack.host.hubs().contains(entry.id).await);
}

// ---------------------------------------------------------------------------
// Reconfiguration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_follow_device_to_new_address() {
    let entry = current_entry("pass");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;
    stack.host.start().await.unwrap();
    let session = stack.connector.session(SERIAL).unwrap();

    stack.connector.move_device("10.0.0.5", "10.0.0.42");
    let mut moved = entry.payload.clone();
    moved.insert("host".into(), "10.0.0.42".into());
    stack.store.write(entry.id, TARGET_VERSION, moved).await.unwrap();
    stack.step().await;

    assert_eq!(stack.host.state(entry.id), EntryState::Loaded);
    assert_eq!(session.host(), "10.0.0.42");
    assert!(!session.is_released());
    let hub = stack.host.hubs().get(entry.id).await.unwrap();
    assert_eq!(hub.address().await.host, "10.0.0.42");
}

#[tokio::test]
async fn should_reload_with_new_credentials() {
    let entry = current_entry("pass");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;
    stack.host.start().await.unwrap();
    let first = stack.connector.session(SERIAL).unwrap();

    let mut changed = entry.payload.clone();
    changed.insert("password".into(), "wrong".into());
    stack.store.write(entry.id, TARGET_VERSION, changed).await.unwrap();
    stack.step().await;

    assert!(first.is_released());
    assert_eq!(stack.host.state(entry.id), EntryState::SetupError);
    assert!(!stack.host.hubs().contains(entry.id).await);
}

// ---------------------------------------------------------------------------
// Events and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_republish_device_events() {
    let entry = current_entry("pass");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;
    stack.host.start().await.unwrap();
    let mut events = stack.bus.subscribe();

    let session = stack.connector.session(SERIAL).unwrap();
    session.trigger(DeviceEvent {
        topic: "tns1:VideoSource/MotionAlarm".to_string(),
        source: "VideoSourceConfigurationToken".to_string(),
        source_idx: "0".to_string(),
        active: true,
    });

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, EventType::DeviceEvent);
    assert_eq!(event.entry_id, Some(entry.id));
    assert_eq!(event.data["active"], true);
}

#[tokio::test]
async fn should_release_sessions_on_shutdown() {
    let entry = current_entry("pass");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;
    stack.host.start().await.unwrap();
    let session = stack.connector.session(SERIAL).unwrap();

    stack.host.run(std::future::ready(())).await;

    assert!(session.is_released());
    assert!(stack.host.hubs().is_empty().await);
    assert!(stack.platforms.loaded(entry.id).is_empty());
    assert_eq!(stack.host.state(entry.id), EntryState::NotLoaded);
    assert_eq!(stack.bus.subscription_count(), 0);
}

#[tokio::test]
async fn should_unload_on_request() {
    let entry = current_entry("pass");
    let mut stack = Stack::new(vec![garage()], vec![entry.clone()]).await;
    stack.host.start().await.unwrap();

    stack.host.unload(entry.id).await.unwrap();
    stack.host.unload(entry.id).await.unwrap();

    assert_eq!(stack.host.state(entry.id), EntryState::NotLoaded);
    assert!(stack.connector.session(SERIAL).unwrap().is_released());
    assert_eq!(stack.store.listener_count().await, 0);
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_seed_missing_entries_once() {
    let stack = Stack::new(vec![garage()], vec![]).await;
    let seeds = || {
        vec![EntrySeed {
            id: None,
            title: "Garage camera".to_string(),
            version: 1,
            data: payload(json!({ "address": "10.0.0.5", "username": "root", "password": "pass" })),
        }]
    };

    assert_eq!(seed_entries(&stack.store, seeds()).await.unwrap(), 1);
    assert_eq!(seed_entries(&stack.store, seeds()).await.unwrap(), 0);

    let entries = stack.store.list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].version, 1);
}
