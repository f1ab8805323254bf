//! Device service: use-cases for the device registry.

use std::future::Future;

use axlink_domain::device::{Device, DeviceInfo};
use axlink_domain::error::AxlinkError;
use axlink_domain::id::EntryId;

use crate::ports::{DeviceRegistry, DeviceRepository};

/// Application service for device records.
///
/// Implements the [`DeviceRegistry`] port on top of a [`DeviceRepository`].
pub struct DeviceService<R> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Create a new device after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AxlinkError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name))]
    pub async fn create_device(&self, device: Device) -> Result<Device, AxlinkError> {
        device.validate()?;
        self.repo.create(device).await
    }

    /// Update an existing device.
    ///
    /// # Errors
    ///
    /// Returns [`AxlinkError::Validation`] if invariants fail, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, device))]
    pub async fn update_device(&self, device: Device) -> Result<Device, AxlinkError> {
        device.validate()?;
        self.repo.update(device).await
    }

    /// Create or update a device by its `(entry_id, unique_id)` pair.
    ///
    /// If the entry already registered a device under the same unique id, its
    /// name, manufacturer, model and firmware are updated (preserving the
    /// original UUID). Otherwise a new device is created.
    ///
    /// # Errors
    ///
    /// Returns [`AxlinkError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name))]
    pub async fn upsert(&self, device: Device) -> Result<Device, AxlinkError> {
        if let Some(existing) = self
            .repo
            .find_by_entry_unique_id(device.entry_id, &device.unique_id)
            .await?
        {
            let updated = Device {
                id: existing.id,
                ..device
            };
            return self.update_device(updated).await;
        }
        self.create_device(device).await
    }
}

impl<R> DeviceRegistry for DeviceService<R>
where
    R: DeviceRepository + Send + Sync,
{
    fn upsert_device(
        &self,
        entry_id: EntryId,
        info: &DeviceInfo,
    ) -> impl Future<Output = Result<Device, AxlinkError>> + Send {
        let device = Device::from_info(entry_id, info);
        async move { self.upsert(device?).await }
    }
}
