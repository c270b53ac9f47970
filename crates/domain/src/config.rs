//! The persisted configuration document — the single state root the engine
//! owns for the process lifetime.
//!
//! Devices and hub state are mutable and rewritten in full on every change;
//! the connection parameters (`mqtt.url`, `harmony.url`, `port`) are
//! read-only inputs.

use serde::{Deserialize, Serialize};

use crate::device::DeviceRecord;
use crate::hub::HubState;

/// Connection parameters for the MQTT transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Broker address, e.g. `mqtt.local:1883`.
    pub url: String,
}

/// The whole persisted document: device registry + hub state + static
/// connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub mqtt: TransportSettings,
    pub harmony: HubState,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

fn default_port() -> u16 {
    3000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, SwitchStatus};
    use crate::hub::HubStatus;

    const SAMPLE: &str = r#"{
        "mqtt": { "url": "mqtt.local:1883" },
        "harmony": {
            "url": "hub.local",
            "status": "off",
            "activities": []
        },
        "port": 8080,
        "devices": [
            { "name": "Terrasse", "baseURL": "/sonoff1", "type": "switch", "status": "on" },
            { "name": "Board", "baseURL": "/r1", "type": "relay",
              "states": [false, false, false, false, false, false, false, false] },
            { "name": "Garten", "baseURL": "/env1", "type": "environment" }
        ]
    }"#;

    #[test]
    fn should_parse_full_document() {
        let doc: ConfigDocument = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(doc.mqtt.url, "mqtt.local:1883");
        assert_eq!(doc.harmony.url, "hub.local");
        assert_eq!(doc.harmony.status, HubStatus::Off);
        assert_eq!(doc.port, 8080);
        assert_eq!(doc.devices.len(), 3);
        let DeviceKind::Switch(switch) = &doc.devices[0].kind else {
            panic!("expected a switch record first");
        };
        assert_eq!(switch.status, SwitchStatus::On);
    }

    #[test]
    fn should_default_port_and_devices_when_missing() {
        let doc: ConfigDocument = serde_json::from_str(
            r#"{ "mqtt": { "url": "m:1883" }, "harmony": { "url": "h" } }"#,
        )
        .unwrap();
        assert_eq!(doc.port, 3000);
        assert!(doc.devices.is_empty());
        assert!(doc.harmony.activities.is_empty());
    }

    #[test]
    fn should_roundtrip_document_through_serde_json() {
        let doc: ConfigDocument = serde_json::from_str(SAMPLE).unwrap();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let parsed: ConfigDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }
}
