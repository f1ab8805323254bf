//! # axlink-app
//!
//! Application layer: the config entry lifecycle and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define **port traits** the host collaborators implement:
//!   - `SessionConnector` / `DeviceSession`: open and drive a device session
//!   - `DeviceRegistry` / `DeviceRepository`: record devices
//!   - `PlatformForwarder`: hand a live hub to the host's entity platforms
//!   - `EventPublisher` / `EventSubscriber`: the host event bus
//!   - `EntryStore`: persisted config entries and their update listeners
//! - Define the **driving port** the host calls: `Integration`
//!   (`setup_entry`, `unload_entry`, `migrate_entry`, `handle_command`)
//! - Implement it in [`controller::EntryController`], keeping live hubs in an
//!   explicit [`hub::HubRegistry`] context
//! - Provide **in-process infrastructure** (event bus, platform tracker) that
//!   doesn't need IO
//!
//! ## Dependency rule
//! Depends on `axlink-domain` only (plus `tokio` for channels and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod controller;
pub mod event_bus;
pub mod hub;
pub mod inbox;
pub mod platforms;
pub mod ports;
pub mod services;
