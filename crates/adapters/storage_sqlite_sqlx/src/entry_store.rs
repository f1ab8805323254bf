//! `SQLite` implementation of [`EntryStore`].
//!
//! Payloads are stored as JSON text next to their schema version. Update
//! listeners live in memory only.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use tokio::sync::Mutex;

use axlink_app::inbox::EntryInbox;
use axlink_app::ports::EntryStore;
use axlink_domain::entry::{ConfiguredEntry, Payload};
use axlink_domain::error::{AxlinkError, NotFoundError};
use axlink_domain::id::{EntryId, ListenerId};

use crate::error::StorageError;

struct Wrapper(ConfiguredEntry);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let title: String = row.try_get("title")?;
        let version: i64 = row.try_get("version")?;
        let data: String = row.try_get("data")?;

        let id = EntryId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let version = u32::try_from(version).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let payload: Payload =
            serde_json::from_str(&data).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(ConfiguredEntry {
            id,
            title,
            version,
            payload,
        }))
    }
}

const INSERT: &str = "INSERT INTO config_entries (id, title, version, data) VALUES (?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM config_entries WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM config_entries ORDER BY title";
const UPDATE: &str = "UPDATE config_entries SET version = ?, data = ? WHERE id = ?";

fn not_found(id: EntryId) -> AxlinkError {
    NotFoundError {
        entity: "ConfiguredEntry",
        id: id.to_string(),
    }
    .into()
}

/// `SQLite`-backed entry store.
///
/// Cloning shares the pool and the listener table.
#[derive(Clone)]
pub struct SqliteEntryStore {
    pool: SqlitePool,
    listeners: Arc<Mutex<HashMap<ListenerId, EntryInbox>>>,
}

impl SqliteEntryStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            listeners: Arc::default(),
        }
    }

    /// Number of registered update listeners.
    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }

    async fn notify(&self, id: EntryId) {
        let listeners = self.listeners.lock().await;
        for inbox in listeners.values().filter(|inbox| inbox.entry_id() == id) {
            if !inbox.notify_updated() {
                tracing::debug!(entry_id = %id, "update listener inbox closed");
            }
        }
    }
}

impl EntryStore for SqliteEntryStore {
    fn read(
        &self,
        id: EntryId,
    ) -> impl Future<Output = Result<ConfiguredEntry, AxlinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            row.map(|w| w.0).ok_or_else(|| not_found(id))
        }
    }

    fn write(
        &self,
        id: EntryId,
        version: u32,
        payload: Payload,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        async move {
            let data = serde_json::to_string(&payload).map_err(StorageError::from)?;
            let result = sqlx::query(UPDATE)
                .bind(i64::from(version))
                .bind(data)
                .bind(id.to_string())
                .execute(&self.pool)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                return Err(not_found(id));
            }

            self.notify(id).await;
            Ok(())
        }
    }

    fn insert(
        &self,
        entry: ConfiguredEntry,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            let data = serde_json::to_string(&entry.payload).map_err(StorageError::from)?;
            sqlx::query(INSERT)
                .bind(entry.id.to_string())
                .bind(&entry.title)
                .bind(i64::from(entry.version))
                .bind(data)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn list(&self) -> impl Future<Output = Result<Vec<ConfiguredEntry>, AxlinkError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn register_update_listener(
        &self,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<ListenerId, AxlinkError>> + Send {
        async move {
            let id = ListenerId::new();
            self.listeners.lock().await.insert(id, inbox);
            Ok(id)
        }
    }

    fn remove_update_listener(
        &self,
        id: ListenerId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        async move { Ok(self.listeners.lock().await.remove(&id).is_some()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use axlink_app::inbox::{self, EntryCommand};

    async fn setup() -> SqliteEntryStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteEntryStore::new(db.pool().clone())
    }

    fn entry() -> ConfiguredEntry {
        let payload = match serde_json::json!({
            "host": "10.0.0.5",
            "username": "root",
            "password": "pass",
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        ConfiguredEntry::new("Garage camera", 3, payload)
    }

    #[tokio::test]
    async fn should_insert_and_read_entry() {
        let store = setup().await;
        let entry = entry();

        store.insert(entry.clone()).await.unwrap();

        assert_eq!(store.read(entry.id).await.unwrap(), entry);
        assert_eq!(store.list().await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_entry() {
        let store = setup().await;

        let result = store.read(EntryId::new()).await;

        assert!(matches!(result, Err(AxlinkError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_overwrite_version_and_payload() {
        let store = setup().await;
        let mut entry = entry();
        entry.version = 1;
        store.insert(entry.clone()).await.unwrap();

        let mut payload = entry.payload.clone();
        payload.insert("host".into(), "10.0.0.42".into());
        store.write(entry.id, 3, payload.clone()).await.unwrap();

        let stored = store.read(entry.id).await.unwrap();
        assert_eq!(stored.version, 3);
        assert_eq!(stored.payload, payload);
        assert_eq!(stored.title, "Garage camera");
    }

    #[tokio::test]
    async fn should_refuse_write_to_unknown_entry() {
        let store = setup().await;

        let result = store.write(EntryId::new(), 3, Payload::new()).await;

        assert!(matches!(result, Err(AxlinkError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_notify_only_listeners_of_written_entry() {
        let store = setup().await;
        let watched = entry();
        let other = entry();
        store.insert(watched.clone()).await.unwrap();
        store.insert(other.clone()).await.unwrap();
        let (tx, mut rx) = inbox::channel();
        store
            .register_update_listener(EntryInbox::new(watched.id, tx.clone()))
            .await
            .unwrap();

        store.write(other.id, 3, other.payload.clone()).await.unwrap();
        assert!(rx.try_recv().is_err());

        store
            .write(watched.id, 3, watched.payload.clone())
            .await
            .unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            EntryCommand::Updated {
                entry_id: watched.id
            }
        );
    }

    #[tokio::test]
    async fn should_stop_notifying_removed_listener() {
        let store = setup().await;
        let entry = entry();
        store.insert(entry.clone()).await.unwrap();
        let (tx, mut rx) = inbox::channel();
        let id = store
            .register_update_listener(EntryInbox::new(entry.id, tx))
            .await
            .unwrap();

        assert!(store.remove_update_listener(id).await.unwrap());
        assert!(!store.remove_update_listener(id).await.unwrap());
        store.write(entry.id, 3, entry.payload.clone()).await.unwrap();

        assert_eq!(store.listener_count().await, 0);
        assert!(rx.try_recv().is_err());
    }
}
