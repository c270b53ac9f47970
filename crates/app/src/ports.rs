//! Port definitions — the boundaries the engine talks through.
//!
//! All three ports are fire-and-forget: the engine issues the call before an
//! event's processing is considered complete but never awaits the outcome.
//! Implementations must not block, must deliver at-most-once, and must log
//! their own failures instead of surfacing them.

use std::sync::Arc;

use hauslink_domain::config::ConfigDocument;

/// Persists the configuration document (whole-document overwrite).
pub trait ConfigStore: Send + Sync {
    /// Issue a persistence write for the current document state.
    fn persist(&self, document: &ConfigDocument);
}

impl<T: ConfigStore> ConfigStore for Arc<T> {
    fn persist(&self, document: &ConfigDocument) {
        (**self).persist(document);
    }
}

/// Publishes subscriber-issued messages to the telemetry transport.
pub trait TransportPublisher: Send + Sync {
    /// Forward one message verbatim.
    fn publish(&self, topic: &str, body: &str);
}

impl<T: TransportPublisher> TransportPublisher for Arc<T> {
    fn publish(&self, topic: &str, body: &str) {
        (**self).publish(topic, body);
    }
}

/// Forwards control commands to the remote-control hub.
pub trait HubCommands: Send + Sync {
    fn start_activity(&self, activity_id: i64);
    fn power_off(&self);
}

impl<T: HubCommands> HubCommands for Arc<T> {
    fn start_activity(&self, activity_id: i64) {
        (**self).start_activity(activity_id);
    }

    fn power_off(&self) {
        (**self).power_off();
    }
}
