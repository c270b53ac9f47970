//! Wire shapes of the hub's local WebSocket API.
//!
//! Requests are `hbus` envelopes correlated by a caller-chosen string id;
//! the hub pushes unsolicited `stateDigest` notifications on the same
//! socket. Activity ids arrive as strings or numbers depending on firmware,
//! so both are accepted.

use serde::Deserialize;
use serde_json::{Value, json};

use hauslink_domain::hub::{ActivityInfo, StateDigest};

pub const PROVISION_CMD: &str = "setup.account?getProvisionInfo";
pub const DIGEST_CMD: &str = "vnd.logitech.connect/vnd.logitech.statedigest?get";
pub const CONFIG_CMD: &str = "vnd.logitech.harmony/vnd.logitech.harmony.engine?config";
pub const RUN_ACTIVITY_CMD: &str = "harmony.activityengine?runactivity";

/// Build an `hbus` request envelope.
#[must_use]
pub fn request(remote_id: &str, id: &str, cmd: &str, params: Value) -> Value {
    json!({
        "hubId": remote_id,
        "timeout": 30,
        "hbus": {
            "cmd": cmd,
            "id": id,
            "params": params,
        }
    })
}

/// Any inbound hub frame: a correlated response (`id`) or a notification
/// (`type`).
#[derive(Debug, Deserialize)]
pub struct HubMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl HubMessage {
    /// Whether this frame is a state-digest notification.
    #[must_use]
    pub fn is_digest_notification(&self) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|kind| kind.contains("stateDigest"))
    }
}

fn wire_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse a digest payload (notification data or the digest-get response).
#[must_use]
pub fn parse_digest(data: &Value) -> Option<StateDigest> {
    Some(StateDigest {
        error_code: data
            .get("errorCode")
            .and_then(Value::as_str)
            .unwrap_or("200")
            .to_string(),
        activity_status: data.get("activityStatus").and_then(Value::as_i64)?,
        activity_id: data.get("activityId").and_then(wire_id)?,
    })
}

/// Extract the running activity id from a digest-get response.
#[must_use]
pub fn parse_current_activity(data: &Value) -> Option<i64> {
    data.get("activityId").and_then(wire_id)
}

/// Extract the activity list from a config response.
#[must_use]
pub fn parse_activities(data: &Value) -> Vec<ActivityInfo> {
    let Some(entries) = data.get("activity").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            Some(ActivityInfo {
                id: entry.get("id").and_then(wire_id)?,
                label: entry.get("label").and_then(Value::as_str)?.to_string(),
            })
        })
        .collect()
}
