//! Events: records published on the host event bus, and the raw
//! notifications a device session streams.

use serde::{Deserialize, Serialize};

use crate::id::{EntryId, EventId};
use crate::time::{self, Timestamp};

define_str_enum! {
    /// Names of the bus events this integration publishes or listens to.
    pub enum EventType {
        /// The host is stopping; every live entry should release its session.
        HostStop => "host_stop",
        /// A device notification republished under its entry id.
        DeviceEvent => "device_event",
    }
}

/// An immutable record published on the host event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    /// Entry the event originates from, if any.
    pub entry_id: Option<EntryId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(event_type: EventType, entry_id: Option<EntryId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entry_id,
            data,
            timestamp: time::now(),
        }
    }

    /// Wrap a device notification for republication under `entry_id`.
    #[must_use]
    pub fn from_device(entry_id: EntryId, event: &DeviceEvent) -> Self {
        Self::new(
            EventType::DeviceEvent,
            Some(entry_id),
            serde_json::json!({
                "topic": event.topic,
                "source": event.source,
                "source_idx": event.source_idx,
                "active": event.active,
            }),
        )
    }
}

/// A notification streamed by a device session (motion detected, input
/// toggled, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Event topic, e.g. `tns1:VideoSource/MotionAlarm`.
    pub topic: String,
    /// Name of the source property, e.g. `VideoSourceConfigurationToken`.
    pub source: String,
    /// Index of the source (channel, port, …).
    pub source_idx: String,
    pub active: bool,
}
