//! Platform forwarder port: hands a live hub to the host's entity platforms.
//!
//! How a platform turns the hub into entities (sensors, switches, …) is the
//! host's business; the controller only asks for setup and unload.

use std::future::Future;
use std::sync::Arc;

use axlink_domain::entry::Platform;
use axlink_domain::error::AxlinkError;
use axlink_domain::id::EntryId;

use crate::hub::HubHandle;
use crate::ports::DeviceSession;

/// Sets up and unloads per-platform entity adapters for an entry.
pub trait PlatformForwarder: Send + Sync {
    /// Set up `platforms` for the hub's entry.
    fn forward_setup<S: DeviceSession>(
        &self,
        hub: Arc<HubHandle<S>>,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send;

    /// Unload `platforms` for `entry_id`. Returns `false` when any platform
    /// refused to unload.
    fn forward_unload(
        &self,
        entry_id: EntryId,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;
}

impl<T: PlatformForwarder> PlatformForwarder for Arc<T> {
    fn forward_setup<S: DeviceSession>(
        &self,
        hub: Arc<HubHandle<S>>,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        (**self).forward_setup(hub, platforms)
    }

    fn forward_unload(
        &self,
        entry_id: EntryId,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        (**self).forward_unload(entry_id, platforms)
    }
}
