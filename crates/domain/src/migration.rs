//! Schema migrations for stored entry payloads.
//!
//! Payloads are a tagged union over the schema versions this build knows
//! about. [`migrate`] is the only code path that moves a payload from one tag
//! to the next; each step is a pure structural rewrite that keeps every key
//! it does not need to touch, credentials included.
//!
//! | Version | Shape |
//! |---------|-------|
//! | 1 | connection settings nested under `device`, address stored as `address` |
//! | 2 | flat payload, address stored as `host` |
//! | 3 | `mac` normalised to lowercase colon-separated form |

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::Payload;

/// Schema version this build reads and writes.
pub const TARGET_VERSION: u32 = 3;

const LEGACY_ADDRESS_KEY: &str = "address";
const HOST_KEY: &str = "host";
const MAC_KEY: &str = "mac";

/// Why a stored payload cannot be used by this build.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The entry was written by a newer build. Never migrated downwards.
    #[error("stored schema version {stored} is newer than supported version {target}")]
    UnsupportedSchema { stored: u32, target: u32 },

    /// The entry is older than the target and has not been migrated yet.
    #[error("entry is at schema version {stored}, version {target} required")]
    MigrationRequired { stored: u32, target: u32 },

    /// No chain of steps leads from this version to the target.
    #[error("no migration path from schema version {from}")]
    NoMigrationPath { from: u32 },

    /// The payload's structure does not match its declared version.
    #[error("payload does not match schema version {version}")]
    Malformed {
        version: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of a [`migrate`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub version: u32,
    pub payload: Payload,
    /// `false` when the input was already at [`TARGET_VERSION`].
    pub changed: bool,
}

/// Bring a stored payload up to [`TARGET_VERSION`].
///
/// A payload already at the target is returned as is with
/// `changed == false`, which makes the call idempotent.
///
/// # Errors
///
/// - [`MigrationError::UnsupportedSchema`] when `version` is above the target
/// - [`MigrationError::NoMigrationPath`] for versions no step starts from
/// - [`MigrationError::Malformed`] when the payload cannot be read at `version`
pub fn migrate(version: u32, payload: &Payload) -> Result<Migrated, MigrationError> {
    match version.cmp(&TARGET_VERSION) {
        Ordering::Greater => Err(MigrationError::UnsupportedSchema {
            stored: version,
            target: TARGET_VERSION,
        }),
        Ordering::Equal => Ok(Migrated {
            version,
            payload: payload.clone(),
            changed: false,
        }),
        Ordering::Less => {
            let mut stored = VersionedPayload::from_stored(version, payload.clone())?;
            while stored.version() < TARGET_VERSION {
                stored = stored.upgrade();
            }
            Ok(Migrated {
                version: stored.version(),
                payload: stored.into_payload()?,
                changed: true,
            })
        }
    }
}

/// Check that an entry can be used without migrating it first.
///
/// # Errors
///
/// [`MigrationError::UnsupportedSchema`] above the target,
/// [`MigrationError::MigrationRequired`] below it.
pub fn ensure_current(version: u32) -> Result<(), MigrationError> {
    match version.cmp(&TARGET_VERSION) {
        Ordering::Equal => Ok(()),
        Ordering::Greater => Err(MigrationError::UnsupportedSchema {
            stored: version,
            target: TARGET_VERSION,
        }),
        Ordering::Less => Err(MigrationError::MigrationRequired {
            stored: version,
            target: TARGET_VERSION,
        }),
    }
}

/// Normalise a MAC address to lowercase, colon-separated form.
///
/// Accepts `AA:BB:CC:DD:EE:FF`, `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff` and
/// `AABBCCDDEEFF`. Anything else is returned unchanged.
#[must_use]
pub fn format_mac(mac: &str) -> String {
    if mac.len() == 17 {
        if mac.matches(':').count() == 5 {
            return mac.to_lowercase();
        }
        if mac.matches('-').count() == 5 {
            return mac.replace('-', ":").to_lowercase();
        }
    }

    let compact = if mac.len() == 14 && mac.matches('.').count() == 2 {
        mac.replace('.', "")
    } else {
        mac.to_string()
    };

    if compact.len() == 12 && compact.chars().all(|c| c.is_ascii_hexdigit()) {
        let lower = compact.to_ascii_lowercase();
        let pairs: Vec<&str> = (0..12).step_by(2).map(|i| &lower[i..i + 2]).collect();
        return pairs.join(":");
    }

    mac.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaV1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device: Option<Payload>,
    #[serde(flatten)]
    rest: Payload,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaV2 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac: Option<Value>,
    #[serde(flatten)]
    rest: Payload,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaV3 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac: Option<Value>,
    #[serde(flatten)]
    rest: Payload,
}

impl From<SchemaV1> for SchemaV2 {
    fn from(v1: SchemaV1) -> Self {
        let mut rest = v1.rest;
        if let Some(device) = v1.device {
            rest.extend(device);
        }
        if let Some(address) = rest.remove(LEGACY_ADDRESS_KEY) {
            rest.entry(HOST_KEY).or_insert(address);
        }
        let mac = rest.remove(MAC_KEY);
        Self { mac, rest }
    }
}

impl From<SchemaV2> for SchemaV3 {
    fn from(v2: SchemaV2) -> Self {
        let mac = v2.mac.map(|value| match value {
            Value::String(raw) => Value::String(format_mac(&raw)),
            other => other,
        });
        Self { mac, rest: v2.rest }
    }
}

#[derive(Debug)]
enum VersionedPayload {
    V1(SchemaV1),
    V2(SchemaV2),
    V3(SchemaV3),
}

impl VersionedPayload {
    fn from_stored(version: u32, payload: Payload) -> Result<Self, MigrationError> {
        let value = Value::Object(payload);
        let parsed = match version {
            1 => serde_json::from_value(value).map(Self::V1),
            2 => serde_json::from_value(value).map(Self::V2),
            3 => serde_json::from_value(value).map(Self::V3),
            stored if stored > TARGET_VERSION => {
                return Err(MigrationError::UnsupportedSchema {
                    stored,
                    target: TARGET_VERSION,
                });
            }
            from => return Err(MigrationError::NoMigrationPath { from }),
        };
        parsed.map_err(|source| MigrationError::Malformed { version, source })
    }

    fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
            Self::V3(_) => 3,
        }
    }

    fn upgrade(self) -> Self {
        match self {
            Self::V1(v1) => Self::V2(v1.into()),
            Self::V2(v2) => Self::V3(v2.into()),
            current @ Self::V3(_) => current,
        }
    }

    fn into_payload(self) -> Result<Payload, MigrationError> {
        let version = self.version();
        match self {
            Self::V1(inner) => serde_json::to_value(inner),
            Self::V2(inner) => serde_json::to_value(inner),
            Self::V3(inner) => serde_json::to_value(inner),
        }
        .and_then(serde_json::from_value)
        .map_err(|source| MigrationError::Malformed { version, source })
    }
}
