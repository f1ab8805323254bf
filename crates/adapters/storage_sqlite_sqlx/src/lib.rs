//! # axlink-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement `EntryStore` and `DeviceRepository` from `axlink-app::ports`
//! - Fan entry writes out to the update listeners registered for that entry
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `axlink-app` (for port traits) and `axlink-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod device_repo;
pub mod entry_store;
pub mod error;
pub mod pool;

pub use device_repo::SqliteDeviceRepository;
pub use entry_store::SqliteEntryStore;
pub use error::StorageError;
pub use pool::{Config, Database};
