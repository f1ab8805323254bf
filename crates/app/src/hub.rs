//! Live hubs and the registry the host looks them up in.
//!
//! The registry is an explicit context object owned by whoever owns the
//! integration; every controller operation receives it by reference.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use axlink_domain::device::DeviceInfo;
use axlink_domain::entry::{DeviceAddress, EntryConfig};
use axlink_domain::id::{EntryId, ListenerId, SubscriptionId};

use crate::ports::DeviceSession;

/// The per-entry object holding the live session and the device it reached.
///
/// Entity platforms receive it wrapped in an [`Arc`] and keep it for as long
/// as their entities live.
pub struct HubHandle<S> {
    entry_id: EntryId,
    session: S,
    device: DeviceInfo,
    config: RwLock<EntryConfig>,
}

impl<S: DeviceSession> HubHandle<S> {
    #[must_use]
    pub fn new(entry_id: EntryId, session: S, device: DeviceInfo, config: EntryConfig) -> Self {
        Self {
            entry_id,
            session,
            device,
            config: RwLock::new(config),
        }
    }

    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    #[must_use]
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Snapshot of the configuration the hub currently runs with.
    pub async fn config(&self) -> EntryConfig {
        self.config.read().await.clone()
    }

    /// Address the session currently targets.
    pub async fn address(&self) -> DeviceAddress {
        self.config.read().await.address()
    }

    /// Swap the stored configuration, returning the previous one.
    pub async fn replace_config(&self, config: EntryConfig) -> EntryConfig {
        std::mem::replace(&mut *self.config.write().await, config)
    }
}

/// Everything an activated entry registered, so teardown can undo it.
pub struct ActiveEntry<S> {
    pub hub: Arc<HubHandle<S>>,
    /// Update listener registered with the entry store.
    pub listener: Option<ListenerId>,
    /// One-shot shutdown hook registered with the event bus.
    pub subscription: Option<SubscriptionId>,
    /// Task republishing device events on the bus.
    pub event_task: Option<JoinHandle<()>>,
}

impl<S> ActiveEntry<S> {
    #[must_use]
    pub fn new(hub: Arc<HubHandle<S>>) -> Self {
        Self {
            hub,
            listener: None,
            subscription: None,
            event_task: None,
        }
    }
}

/// Map from entry id to its live hub.
///
/// Inserts and removals take the lock for the whole operation.
pub struct HubRegistry<S> {
    entries: Mutex<HashMap<EntryId, ActiveEntry<S>>>,
}

impl<S> Default for HubRegistry<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<S> HubRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activated entry. Returns the entry it replaced, if any.
    pub async fn insert(&self, entry: ActiveEntry<S>) -> Option<ActiveEntry<S>> {
        let entry_id = entry.hub.entry_id;
        self.entries.lock().await.insert(entry_id, entry)
    }

    /// Take an entry out of the registry.
    pub async fn remove(&self, entry_id: EntryId) -> Option<ActiveEntry<S>> {
        self.entries.lock().await.remove(&entry_id)
    }

    /// Look up the live hub for an entry.
    pub async fn get(&self, entry_id: EntryId) -> Option<Arc<HubHandle<S>>> {
        self.entries
            .lock()
            .await
            .get(&entry_id)
            .map(|entry| Arc::clone(&entry.hub))
    }

    pub async fn contains(&self, entry_id: EntryId) -> bool {
        self.entries.lock().await.contains_key(&entry_id)
    }

    pub async fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.lock().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
