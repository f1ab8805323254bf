//! Config entries: the persisted record of one configured device.
//!
//! A [`ConfiguredEntry`] stores its payload as an open JSON object together
//! with the schema version the payload was written at. Only the migration
//! engine moves a payload between versions; everything else reads it through
//! the typed current schema, [`EntryConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::EntryId;

/// Open configuration document stored with an entry.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Integration domain name, used to tag entries and logs.
pub const DOMAIN: &str = "axis";

/// One user-configured device instance as persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredEntry {
    pub id: EntryId,
    /// Human readable title shown by the host.
    pub title: String,
    /// Schema version `payload` was written at.
    pub version: u32,
    pub payload: Payload,
}

impl ConfiguredEntry {
    #[must_use]
    pub fn new(title: impl Into<String>, version: u32, payload: Payload) -> Self {
        Self {
            id: EntryId::new(),
            title: title.into(),
            version,
            payload,
        }
    }
}

define_str_enum! {
    /// Transport used to reach the device API.
    pub enum Protocol {
        Http => "http",
        Https => "https",
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Http
    }
}

define_str_enum! {
    /// Host entity platforms this integration forwards setup to.
    pub enum Platform {
        BinarySensor => "binary_sensor",
        Camera => "camera",
        Light => "light",
        Switch => "switch",
    }
}

/// Platforms forwarded on every successful setup.
pub const PLATFORMS: &[Platform] = Platform::ALL;

define_str_enum! {
    /// Host-side bookkeeping state of an entry.
    pub enum EntryState {
        /// Never set up, or torn down.
        NotLoaded => "not_loaded",
        /// Setup completed; a hub is live.
        Loaded => "loaded",
        /// Setup failed transiently; the host will retry.
        SetupRetry => "setup_retry",
        /// Setup failed terminally (e.g. credentials rejected).
        SetupError => "setup_error",
        /// The stored schema could not be migrated.
        MigrationError => "migration_error",
        /// Unloading reported a failure.
        FailedUnload => "failed_unload",
    }
}

/// Where the device API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Credentials used to open a session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_port() -> u16 {
    80
}

/// Typed view of a payload at the current schema version.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Device-specific options this crate does not interpret.
    #[serde(flatten)]
    pub options: Payload,
}

impl EntryConfig {
    /// Read a current-version payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPayload`] when required keys are
    /// missing or mistyped, and [`ValidationError::EmptyHost`] for a blank
    /// host.
    pub fn from_payload(payload: &Payload) -> Result<Self, ValidationError> {
        let config: Self = serde_json::from_value(serde_json::Value::Object(payload.clone()))
            .map_err(ValidationError::InvalidPayload)?;
        if config.host.trim().is_empty() {
            return Err(ValidationError::EmptyHost);
        }
        Ok(config)
    }

    #[must_use]
    pub fn address(&self) -> DeviceAddress {
        DeviceAddress {
            protocol: self.protocol,
            host: self.host.clone(),
            port: self.port,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// `true` when `other` differs from `self` in the host and nothing else.
    ///
    /// Such a change can be applied to a live session without reconnecting.
    #[must_use]
    pub fn is_address_change(&self, other: &Self) -> bool {
        if self.host == other.host {
            return false;
        }
        let mut moved = other.clone();
        moved.host.clone_from(&self.host);
        moved == *self
    }
}

impl fmt::Debug for EntryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mac", &self.mac)
            .field("model", &self.model)
            .field("name", &self.name)
            .field("options", &self.options)
            .finish()
    }
}
