//! Storage port: repository trait for device records.

use std::future::Future;

use axlink_domain::device::Device;
use axlink_domain::error::AxlinkError;
use axlink_domain::id::{DeviceId, EntryId};

/// CRUD access to persisted [`Device`] records.
pub trait DeviceRepository {
    /// Insert a new record.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, AxlinkError>> + Send;

    /// Fetch a record by id.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, AxlinkError>> + Send;

    /// Fetch every record.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, AxlinkError>> + Send;

    /// Fetch the record an entry registered under `unique_id`.
    fn find_by_entry_unique_id(
        &self,
        entry_id: EntryId,
        unique_id: &str,
    ) -> impl Future<Output = Result<Option<Device>, AxlinkError>> + Send;

    /// Overwrite an existing record.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, AxlinkError>> + Send;
}
