//! Entry store port: persisted config entries and their update listeners.

use std::future::Future;
use std::sync::Arc;

use axlink_domain::entry::{ConfiguredEntry, Payload};
use axlink_domain::error::AxlinkError;
use axlink_domain::id::{EntryId, ListenerId};

use crate::inbox::EntryInbox;

/// Host persistence for [`ConfiguredEntry`] records.
///
/// Writing an entry notifies every update listener registered for it by
/// sending [`EntryCommand::Updated`](crate::inbox::EntryCommand::Updated) to
/// the listener's inbox.
pub trait EntryStore: Send + Sync {
    /// Fetch an entry.
    ///
    /// Returns [`AxlinkError::NotFound`] when no entry has this id.
    fn read(&self, id: EntryId)
    -> impl Future<Output = Result<ConfiguredEntry, AxlinkError>> + Send;

    /// Persist a new version and payload for an existing entry.
    fn write(
        &self,
        id: EntryId,
        version: u32,
        payload: Payload,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send;

    /// Add a new entry.
    fn insert(&self, entry: ConfiguredEntry)
    -> impl Future<Output = Result<(), AxlinkError>> + Send;

    /// Fetch every entry.
    fn list(&self) -> impl Future<Output = Result<Vec<ConfiguredEntry>, AxlinkError>> + Send;

    /// Observe future writes to the inbox's entry.
    fn register_update_listener(
        &self,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<ListenerId, AxlinkError>> + Send;

    /// Stop observing. Returns `false` for an unknown listener.
    fn remove_update_listener(
        &self,
        id: ListenerId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;
}

impl<T: EntryStore> EntryStore for Arc<T> {
    fn read(
        &self,
        id: EntryId,
    ) -> impl Future<Output = Result<ConfiguredEntry, AxlinkError>> + Send {
        (**self).read(id)
    }

    fn write(
        &self,
        id: EntryId,
        version: u32,
        payload: Payload,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        (**self).write(id, version, payload)
    }

    fn insert(
        &self,
        entry: ConfiguredEntry,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        (**self).insert(entry)
    }

    fn list(&self) -> impl Future<Output = Result<Vec<ConfiguredEntry>, AxlinkError>> + Send {
        (**self).list()
    }

    fn register_update_listener(
        &self,
        inbox: EntryInbox,
    ) -> impl Future<Output = Result<ListenerId, AxlinkError>> + Send {
        (**self).register_update_listener(inbox)
    }

    fn remove_update_listener(
        &self,
        id: ListenerId,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        (**self).remove_update_listener(id)
    }
}
