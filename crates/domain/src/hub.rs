//! Hub activity state and the pure mutations applied to it.
//!
//! The hub reports its power/activity situation two ways: a one-time
//! bootstrap snapshot (current activity + activity list) and a recurring
//! state digest. Both funnel into [`HubState`] through the methods here;
//! the surrounding synchronizer decides when to persist and broadcast.

use serde::{Deserialize, Serialize};

/// Wire id of the distinguished power-off pseudo-activity.
pub const POWER_ACTIVITY_ID: i64 = -1;

/// Power state reported by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HubStatus {
    On,
    #[default]
    Off,
}

/// One hub-controlled scene. Exactly one is selected whenever the hub is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub label: String,
    pub selected: bool,
}

/// The power-off pseudo-activity, stored apart from the activity list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerActivity {
    pub id: i64,
    pub label: String,
}

/// An activity as returned by the hub's configuration query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub id: i64,
    pub label: String,
}

/// Recurring status snapshot pushed by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDigest {
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "activityStatus")]
    pub activity_status: i64,
    #[serde(rename = "activityId")]
    pub activity_id: i64,
}

/// Hub sub-record of the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubState {
    /// Hub address; read-only connection parameter.
    pub url: String,
    #[serde(default)]
    pub status: HubStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerActivity>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl HubState {
    /// Derive power status and selection for `id`: the hub is off iff `id`
    /// is the power pseudo-activity; `selected` is recomputed over the whole
    /// list so at most one activity ends up selected.
    pub fn select_activity(&mut self, id: i64) {
        self.status = if id == POWER_ACTIVITY_ID {
            HubStatus::Off
        } else {
            HubStatus::On
        };
        for activity in &mut self.activities {
            activity.selected = activity.id == id;
        }
    }

    /// Set the power status from the bootstrap `is hub off` query.
    pub fn set_power(&mut self, off: bool) {
        self.status = if off { HubStatus::Off } else { HubStatus::On };
    }

    /// Rebuild the activity list from a bootstrap snapshot. `current` is the
    /// activity id the hub reported as running when the snapshot was taken.
    /// The power pseudo-activity is pulled out of the list into `power`.
    pub fn rebuild_activities(&mut self, current: i64, infos: Vec<ActivityInfo>) {
        self.activities.clear();
        for info in infos {
            if info.id == POWER_ACTIVITY_ID {
                self.power = Some(PowerActivity {
                    id: info.id,
                    label: info.label,
                });
            } else {
                self.activities.push(Activity {
                    selected: info.id == current,
                    id: info.id,
                    label: info.label,
                });
            }
        }
    }

    /// Apply a steady-state digest. Returns whether state was derived.
    ///
    /// Digests with an unexpected error code or activity status are no-ops,
    /// not errors.
    pub fn apply_digest(&mut self, digest: &StateDigest) -> bool {
        if digest.error_code != "200" {
            return false;
        }
        match digest.activity_status {
            // 0 = hub is off, 3 = hub shutting down
            0 | 3 => {
                self.select_activity(POWER_ACTIVITY_ID);
                true
            }
            // 1 = activity starting, 2 = activity started
            1 | 2 => {
                self.select_activity(digest.activity_id);
                true
            }
            _ => false,
        }
    }
}
