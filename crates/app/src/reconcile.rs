//! Reconciliation policy — pure per-kind merge of a decoded payload into a
//! device record.
//!
//! Invoked only after a successful route; decoding happens here so a
//! malformed payload can be dropped without touching the record. Every
//! successful application is broadcast-worthy.

use serde::Deserialize;
use serde::de::Error as _;
use serde_json::{Map, Value};

use hauslink_domain::device::{DeviceKind, DeviceRecord, SwitchStatus};
use hauslink_domain::time::UnixMillis;

use crate::router::Message;

/// `<base>/env` reading from an environment sensor.
#[derive(Debug, Deserialize)]
struct EnvReading {
    status: String,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
}

/// `<base>/switch` state report from a switch device.
#[derive(Debug, Deserialize)]
struct SwitchReport {
    state: String,
}

/// `<base>/info` report from a switch device.
#[derive(Debug, Deserialize)]
struct SwitchInfo {
    switch: SwitchStatus,
}

/// `<base>/switch/<n>` state report from a relay board.
#[derive(Debug, Deserialize)]
struct SlotReport {
    state: Value,
}

/// Apply a routed message's payload to its device record.
///
/// Returns `Ok(())` when the record mutated; the caller owes exactly one
/// persistence write and one broadcast for it. A decode failure leaves the
/// record untouched.
pub fn apply(
    record: &mut DeviceRecord,
    message: Message,
    payload: &[u8],
    now: UnixMillis,
) -> Result<(), serde_json::Error> {
    match (&mut record.kind, message) {
        (DeviceKind::Environment(env), Message::Env) => {
            let reading: EnvReading = serde_json::from_slice(payload)?;
            env.last = Some(now);
            if reading.status == "OK" {
                env.temperature = reading.temperature;
                env.humidity = reading.humidity;
                env.last_success = Some(now);
            }
            env.status = Some(reading.status);
            Ok(())
        }
        (DeviceKind::Relay(relay), Message::SwitchIndex(index)) => {
            // 1 <= index <= 8 is enforced by the router.
            let report: SlotReport = serde_json::from_slice(payload)?;
            relay.set_slot(index, report.state);
            Ok(())
        }
        (DeviceKind::Relay(relay), Message::Info) => {
            let attrs: Map<String, Value> = serde_json::from_slice(payload)?;
            relay.merge_info(attrs);
            Ok(())
        }
        (DeviceKind::Switch(switch), Message::Switch) => {
            let report: SwitchReport = serde_json::from_slice(payload)?;
            let status = SwitchStatus::from(report.state.as_str());
            // The on/off branches are evaluated independently: any other
            // literal overwrites the status but moves no timestamp.
            if status == SwitchStatus::On {
                switch.on_time = Some(now);
            }
            if status == SwitchStatus::Off {
                switch.off_time = Some(now);
            }
            switch.status = status;
            Ok(())
        }
        (DeviceKind::Switch(switch), Message::Info) => {
            let info: SwitchInfo = serde_json::from_slice(payload)?;
            switch.status = info.switch;
            Ok(())
        }
        _ => Err(serde_json::Error::custom(
            "subtype does not apply to this device kind",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hauslink_domain::device::{EnvironmentState, RelayState, SwitchState};
    use serde_json::json;

    fn environment() -> DeviceRecord {
        DeviceRecord::new(
            "Garten",
            "/env1",
            DeviceKind::Environment(EnvironmentState::default()),
        )
    }

    fn relay() -> DeviceRecord {
        DeviceRecord::new("Board", "/r1", DeviceKind::Relay(RelayState::default()))
    }

    fn switch() -> DeviceRecord {
        DeviceRecord::new(
            "Terrasse",
            "/sonoff1",
            DeviceKind::Switch(SwitchState::default()),
        )
    }

    #[test]
    fn should_update_all_environment_fields_when_status_is_ok() {
        let mut record = environment();
        apply(
            &mut record,
            Message::Env,
            br#"{"status":"OK","temperature":21.5,"humidity":48.0}"#,
            1_000,
        )
        .unwrap();

        let DeviceKind::Environment(env) = &record.kind else {
            unreachable!()
        };
        assert_eq!(env.status.as_deref(), Some("OK"));
        assert_eq!(env.temperature, Some(21.5));
        assert_eq!(env.humidity, Some(48.0));
        assert_eq!(env.last, Some(1_000));
        assert_eq!(env.last_success, Some(1_000));
    }

    #[test]
    fn should_leave_readings_untouched_when_environment_status_is_not_ok() {
        let mut record = environment();
        apply(
            &mut record,
            Message::Env,
            br#"{"status":"OK","temperature":21.5,"humidity":48.0}"#,
            1_000,
        )
        .unwrap();
        apply(
            &mut record,
            Message::Env,
            br#"{"status":"E_SENSOR","temperature":-40.0,"humidity":0.0}"#,
            2_000,
        )
        .unwrap();

        let DeviceKind::Environment(env) = &record.kind else {
            unreachable!()
        };
        assert_eq!(env.status.as_deref(), Some("E_SENSOR"));
        assert_eq!(env.temperature, Some(21.5));
        assert_eq!(env.humidity, Some(48.0));
        assert_eq!(env.last, Some(2_000));
        assert_eq!(env.last_success, Some(1_000));
    }

    #[test]
    fn should_keep_values_but_advance_timestamps_when_ok_message_replayed() {
        let mut record = environment();
        let payload = br#"{"status":"OK","temperature":21.5,"humidity":48.0}"#;
        apply(&mut record, Message::Env, payload, 1_000).unwrap();
        apply(&mut record, Message::Env, payload, 2_000).unwrap();

        let DeviceKind::Environment(env) = &record.kind else {
            unreachable!()
        };
        assert_eq!(env.temperature, Some(21.5));
        assert_eq!(env.humidity, Some(48.0));
        assert_eq!(env.last, Some(2_000));
        assert_eq!(env.last_success, Some(2_000));
    }

    #[test]
    fn should_write_only_the_addressed_relay_slot() {
        let mut record = relay();
        apply(
            &mut record,
            Message::SwitchIndex(3),
            br#"{"state":true}"#,
            1_000,
        )
        .unwrap();

        let DeviceKind::Relay(relay) = &record.kind else {
            unreachable!()
        };
        let expected: Vec<Value> = (0..8).map(|i| json!(i == 2)).collect();
        assert_eq!(relay.states, expected);
    }

    #[test]
    fn should_merge_info_keys_into_relay_extra_map() {
        let mut record = relay();
        apply(
            &mut record,
            Message::Info,
            br#"{"fw":"1.4.2","rssi":-61}"#,
            1_000,
        )
        .unwrap();

        let DeviceKind::Relay(relay) = &record.kind else {
            unreachable!()
        };
        assert_eq!(relay.extra.get("fw"), Some(&json!("1.4.2")));
        assert_eq!(relay.extra.get("rssi"), Some(&json!(-61)));
        // Typed fields stay intact.
        assert_eq!(relay.states.len(), 8);
    }

    #[test]
    fn should_set_on_time_when_switch_turns_on() {
        let mut record = switch();
        apply(&mut record, Message::Switch, br#"{"state":"on"}"#, 1_000).unwrap();

        let DeviceKind::Switch(switch) = &record.kind else {
            unreachable!()
        };
        assert_eq!(switch.status, SwitchStatus::On);
        assert_eq!(switch.on_time, Some(1_000));
        assert_eq!(switch.off_time, None);
    }

    #[test]
    fn should_set_off_time_when_switch_turns_off() {
        let mut record = switch();
        apply(&mut record, Message::Switch, br#"{"state":"off"}"#, 1_000).unwrap();

        let DeviceKind::Switch(switch) = &record.kind else {
            unreachable!()
        };
        assert_eq!(switch.status, SwitchStatus::Off);
        assert_eq!(switch.off_time, Some(1_000));
        assert_eq!(switch.on_time, None);
    }

    #[test]
    fn should_overwrite_status_but_move_no_timestamp_for_other_literals() {
        let mut record = switch();
        apply(&mut record, Message::Switch, br#"{"state":"on"}"#, 1_000).unwrap();
        apply(
            &mut record,
            Message::Switch,
            br#"{"state":"toggling"}"#,
            2_000,
        )
        .unwrap();

        let DeviceKind::Switch(switch) = &record.kind else {
            unreachable!()
        };
        assert_eq!(switch.status, SwitchStatus::Other("toggling".to_string()));
        assert_eq!(switch.on_time, Some(1_000));
        assert_eq!(switch.off_time, None);
    }

    #[test]
    fn should_set_switch_status_from_info_payload() {
        let mut record = switch();
        apply(&mut record, Message::Info, br#"{"switch":"on"}"#, 1_000).unwrap();

        let DeviceKind::Switch(switch) = &record.kind else {
            unreachable!()
        };
        assert_eq!(switch.status, SwitchStatus::On);
        // Info messages never touch the transition timestamps.
        assert_eq!(switch.on_time, None);
    }

    #[test]
    fn should_leave_record_unchanged_when_payload_is_malformed() {
        let mut record = environment();
        let before = record.clone();
        let result = apply(&mut record, Message::Env, b"not json", 1_000);
        assert!(result.is_err());
        assert_eq!(record, before);
    }

    #[test]
    fn should_leave_record_unchanged_when_required_field_is_missing() {
        let mut record = switch();
        let before = record.clone();
        let result = apply(&mut record, Message::Switch, br#"{"power":"on"}"#, 1_000);
        assert!(result.is_err());
        assert_eq!(record, before);
    }

    #[test]
    fn should_reject_subtype_that_does_not_apply_to_kind() {
        let mut record = switch();
        let before = record.clone();
        let result = apply(
            &mut record,
            Message::SwitchIndex(1),
            br#"{"state":true}"#,
            1_000,
        );
        assert!(result.is_err());
        assert_eq!(record, before);
    }
}
