//! Subscription topics per device kind.

use hauslink_domain::device::{DeviceKind, DeviceRecord};

/// Build the broker subscription list for the device registry.
///
/// Switches listen on `/info` and `/switch`, relays on `/info` and the
/// wildcard `/switch/+`, environment sensors on `/env`.
#[must_use]
pub fn subscriptions(devices: &[DeviceRecord]) -> Vec<String> {
    let mut topics = Vec::new();
    for device in devices {
        match &device.kind {
            DeviceKind::Switch(_) => {
                topics.push(format!("{}/info", device.base_url));
                topics.push(format!("{}/switch", device.base_url));
            }
            DeviceKind::Relay(_) => {
                topics.push(format!("{}/info", device.base_url));
                topics.push(format!("{}/switch/+", device.base_url));
            }
            DeviceKind::Environment(_) => {
                topics.push(format!("{}/env", device.base_url));
            }
        }
    }
    topics
}
