//! Topic router — matches an inbound transport topic to the owning device
//! record and the message subtype.

use hauslink_domain::device::{DeviceKind, DeviceRecord, RELAY_SLOTS};

/// Message subtype derived from the topic remainder after the device's base
/// prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// `<base>/env` on an environment device.
    Env,
    /// `<base>/info` on a switch or relay device.
    Info,
    /// `<base>/switch` on a switch device.
    Switch,
    /// `<base>/switch/<n>` on a relay device; 1-based slot index.
    SwitchIndex(u8),
}

/// A routed message: the owning device's registry index plus the subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub device_index: usize,
    pub message: Message,
}

/// Find the owning device record for `topic`.
///
/// The first device whose base prefix matches *and* whose remainder
/// classifies for its kind wins; registry order is the tie-break. `None`
/// means the message is unhandled and must be dropped without side effects.
#[must_use]
pub fn route(devices: &[DeviceRecord], topic: &str) -> Option<Route> {
    devices
        .iter()
        .enumerate()
        .find_map(|(device_index, device)| {
            let remainder = topic.strip_prefix(device.base_url.as_str())?;
            let message = classify(&device.kind, remainder)?;
            Some(Route {
                device_index,
                message,
            })
        })
}

fn classify(kind: &DeviceKind, remainder: &str) -> Option<Message> {
    match kind {
        DeviceKind::Environment(_) => (remainder == "/env").then_some(Message::Env),
        DeviceKind::Switch(_) => match remainder {
            "/switch" => Some(Message::Switch),
            "/info" => Some(Message::Info),
            _ => None,
        },
        DeviceKind::Relay(_) => match remainder {
            "/info" => Some(Message::Info),
            _ => remainder
                .strip_prefix("/switch/")
                .and_then(|raw| raw.parse::<u8>().ok())
                .filter(|n| (1..=RELAY_SLOTS).contains(&usize::from(*n)))
                .map(Message::SwitchIndex),
        },
    }
}
