//! Devices: what a session reports about the physical unit, and the record
//! the host keeps for it in its device registry.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::{DeviceId, EntryId};

/// Manufacturer reported for every device of this family.
pub const MANUFACTURER: &str = "Axis Communications AB";

/// Model information reported by a freshly established session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Serial number; for this family it is the MAC address.
    pub serial: String,
    /// Product model (e.g. `"M1065-LW"`).
    pub model: String,
    /// Product name as configured on the device.
    pub name: String,
    /// Firmware version, when the device reports one.
    pub firmware: Option<String>,
}

/// A device registry record.
///
/// Records are keyed by `(entry_id, unique_id)`: setting up the same entry
/// twice updates the existing record instead of creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// The config entry this device belongs to.
    pub entry_id: EntryId,
    /// Stable identifier within the entry (the serial number).
    pub unique_id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
}

impl Device {
    /// Start building a new device record.
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Build the registry record for what a session reported.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the reported name or serial is empty.
    pub fn from_info(entry_id: EntryId, info: &DeviceInfo) -> Result<Self, ValidationError> {
        let mut builder = Self::builder()
            .entry_id(entry_id)
            .unique_id(&info.serial)
            .name(&info.name)
            .manufacturer(MANUFACTURER)
            .model(&info.model);
        if let Some(firmware) = &info.firmware {
            builder = builder.firmware(firmware);
        }
        builder.build()
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] or
    /// [`ValidationError::EmptyUniqueId`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.unique_id.trim().is_empty() {
            return Err(ValidationError::EmptyUniqueId);
        }
        Ok(())
    }
}

/// Builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    entry_id: Option<EntryId>,
    unique_id: String,
    name: String,
    manufacturer: Option<String>,
    model: Option<String>,
    firmware: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn entry_id(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    #[must_use]
    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = Some(firmware.into());
        self
    }

    /// Finish building, generating a fresh [`DeviceId`].
    ///
    /// A missing entry id yields a random one; callers always set it outside
    /// of tests.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the record invariants fail.
    pub fn build(self) -> Result<Device, ValidationError> {
        let device = Device {
            id: DeviceId::new(),
            entry_id: self.entry_id.unwrap_or_default(),
            unique_id: self.unique_id,
            name: self.name,
            manufacturer: self.manufacturer,
            model: self.model,
            firmware: self.firmware,
        };
        device.validate()?;
        Ok(device)
    }
}
