//! Device records — in-memory state for the physical devices the bridge tracks.
//!
//! A record's kind never changes after load; only its kind-specific mutable
//! fields are updated in place. Field names keep the original document's
//! camelCase because the serialized shape is both the persistence format and
//! the realtime wire contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::UnixMillis;

/// One tracked device: identity plus kind-specific mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    /// Base topic prefix, e.g. `/livingroom/relay1`.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl DeviceRecord {
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            kind,
        }
    }
}

/// Kind-specific device state, internally tagged as `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceKind {
    Switch(SwitchState),
    Relay(RelayState),
    Environment(EnvironmentState),
}

impl DeviceKind {
    /// Kind name as it appears on the wire, for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Switch(_) => "switch",
            Self::Relay(_) => "relay",
            Self::Environment(_) => "environment",
        }
    }
}

/// Reported position of a `switch` device.
///
/// Inbound `state` literals other than `on`/`off` are stored verbatim: they
/// overwrite the status but move no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchStatus {
    On,
    Off,
    #[default]
    Unknown,
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for SwitchStatus {
    fn from(value: &str) -> Self {
        match value {
            "on" => Self::On,
            "off" => Self::Off,
            "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Mutable state for a `switch` device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SwitchState {
    #[serde(default)]
    pub status: SwitchStatus,
    /// Set when a message transitions the switch to `on`.
    #[serde(rename = "onTime", skip_serializing_if = "Option::is_none")]
    pub on_time: Option<UnixMillis>,
    /// Set when a message transitions the switch to `off`.
    #[serde(rename = "offTime", skip_serializing_if = "Option::is_none")]
    pub off_time: Option<UnixMillis>,
}

/// Number of addressable slots on a relay board.
pub const RELAY_SLOTS: usize = 8;

/// Mutable state for an 8-slot `relay` device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayState {
    /// Slot states, wire index 1..=8 maps to `states[0..8]`.
    #[serde(default = "default_slots")]
    pub states: Vec<Value>,
    /// Attributes copied verbatim from `info` payloads. Kept apart from the
    /// typed fields so they cannot clobber identity or slot state.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_slots() -> Vec<Value> {
    vec![Value::Bool(false); RELAY_SLOTS]
}

impl Default for RelayState {
    fn default() -> Self {
        Self {
            states: default_slots(),
            extra: Map::new(),
        }
    }
}

/// Field names owned by the typed record shape; `info` payloads cannot
/// reach them through the open map.
const RESERVED_KEYS: [&str; 4] = ["name", "baseURL", "type", "states"];

impl RelayState {
    /// Write `state` into the 1-based slot `index`.
    ///
    /// Documents may carry fewer than [`RELAY_SLOTS`] entries; the slot list
    /// is grown as needed so the write always lands.
    pub fn set_slot(&mut self, index: u8, state: Value) {
        let slot = usize::from(index) - 1;
        if self.states.len() <= slot {
            self.states.resize(slot + 1, Value::Null);
        }
        self.states[slot] = state;
    }

    /// Merge the keys of an `info` payload into the open attribute map,
    /// overwriting existing keys. Keys that collide with the typed fields
    /// are dropped.
    pub fn merge_info(&mut self, attrs: Map<String, Value>) {
        for (key, value) in attrs {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            self.extra.insert(key, value);
        }
    }
}

/// Mutable state for an `environment` sensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Free-form sensor status, `"OK"` or an error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Timestamp of the last message, regardless of status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<UnixMillis>,
    /// Timestamp of the last `status == "OK"` message.
    #[serde(rename = "lastSuccess", skip_serializing_if = "Option::is_none")]
    pub last_success: Option<UnixMillis>,
}
