//! Device registry port: the host's record of physical devices.

use std::future::Future;
use std::sync::Arc;

use axlink_domain::device::{Device, DeviceInfo};
use axlink_domain::error::AxlinkError;
use axlink_domain::id::EntryId;

/// Records the device behind an activated entry.
pub trait DeviceRegistry: Send + Sync {
    /// Create or update the record for the device a session reported.
    fn upsert_device(
        &self,
        entry_id: EntryId,
        info: &DeviceInfo,
    ) -> impl Future<Output = Result<Device, AxlinkError>> + Send;
}

impl<T: DeviceRegistry> DeviceRegistry for Arc<T> {
    fn upsert_device(
        &self,
        entry_id: EntryId,
        info: &DeviceInfo,
    ) -> impl Future<Output = Result<Device, AxlinkError>> + Send {
        (**self).upsert_device(entry_id, info)
    }
}
