//! Declarations of the simulated devices.

use std::fmt;

use serde::{Deserialize, Serialize};

use axlink_domain::device::DeviceInfo;

fn default_true() -> bool {
    true
}

/// One simulated device, reachable at `host` with the given credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualDeviceConfig {
    pub host: String,
    /// Serial number, reported as the device's unique id.
    pub serial: String,
    pub model: String,
    pub name: String,
    #[serde(default)]
    pub firmware: Option<String>,
    pub username: String,
    pub password: String,
    /// `false` simulates a device that is offline.
    #[serde(default = "default_true")]
    pub reachable: bool,
}

impl VirtualDeviceConfig {
    /// What a session with this device reports.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            serial: self.serial.clone(),
            model: self.model.clone(),
            name: self.name.clone(),
            firmware: self.firmware.clone(),
        }
    }
}

impl fmt::Debug for VirtualDeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDeviceConfig")
            .field("host", &self.host)
            .field("serial", &self.serial)
            .field("model", &self.model)
            .field("name", &self.name)
            .field("firmware", &self.firmware)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("reachable", &self.reachable)
            .finish()
    }
}
