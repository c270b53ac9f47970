//! The serialized event-processing engine.
//!
//! Every mutation of the configuration document flows through one task that
//! owns it: inbound transport messages, hub events, and subscriber commands
//! are all delivered over the same channel, so no two mutations can
//! interleave. Persistence and fanout are issued before an event's
//! processing completes but their outcome is never awaited.

use tokio::sync::{mpsc, oneshot};

use hauslink_domain::config::ConfigDocument;
use hauslink_domain::device::DeviceRecord;
use hauslink_domain::hub::{ActivityInfo, HubState, StateDigest};
use hauslink_domain::time::now_millis;

use crate::fanout::{Update, UpdateBus};
use crate::ports::{ConfigStore, HubCommands, TransportPublisher};
use crate::{reconcile, router};

/// A subscriber-issued command. Commands never mutate engine state; they are
/// forwarded to the transport/hub collaborators fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Publish { topic: String, body: String },
    SetActivity { activity_id: i64 },
    PowerOff,
}

/// Events delivered to the engine's serialized processing context.
#[derive(Debug)]
pub enum EngineEvent {
    /// Inbound transport message.
    Transport { topic: String, payload: Vec<u8> },
    /// The hub client established its connection.
    HubConnected,
    /// Bootstrap resolution of the `is hub off` query.
    HubPower { off: bool },
    /// Bootstrap resolution of the current-activity and activity-list
    /// queries.
    HubActivities {
        current: i64,
        activities: Vec<ActivityInfo>,
    },
    /// Recurring hub state digest.
    HubDigest(StateDigest),
    /// Subscriber command to forward to a collaborator.
    Command(Command),
    /// Snapshot request from a newly connected subscriber.
    Snapshot {
        reply: oneshot::Sender<DocumentSnapshot>,
    },
}

/// Immutable snapshot of the mutable document state, taken for fanout and
/// the status endpoint.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub devices: Vec<DeviceRecord>,
    pub hub: HubState,
}

/// Hub connection lifecycle. Digests only apply once the bootstrap snapshot
/// has landed; earlier ones are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum HubLink {
    #[default]
    Disconnected,
    Connected,
    Ready,
}

/// Cloneable handle used by adapters to feed events into the engine and to
/// observe its update fanout.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    events: mpsc::Sender<EngineEvent>,
    updates: UpdateBus,
}

impl EngineHandle {
    /// Deliver an inbound transport message.
    pub async fn transport_message(&self, topic: String, payload: Vec<u8>) {
        self.send(EngineEvent::Transport { topic, payload }).await;
    }

    /// Signal that the hub client connected.
    pub async fn hub_connected(&self) {
        self.send(EngineEvent::HubConnected).await;
    }

    /// Deliver the bootstrap power resolution.
    pub async fn hub_power(&self, off: bool) {
        self.send(EngineEvent::HubPower { off }).await;
    }

    /// Deliver the bootstrap activity snapshot.
    pub async fn hub_activities(&self, current: i64, activities: Vec<ActivityInfo>) {
        self.send(EngineEvent::HubActivities {
            current,
            activities,
        })
        .await;
    }

    /// Deliver a recurring hub digest.
    pub async fn hub_digest(&self, digest: StateDigest) {
        self.send(EngineEvent::HubDigest(digest)).await;
    }

    /// Forward a subscriber command.
    pub async fn command(&self, command: Command) {
        self.send(EngineEvent::Command(command)).await;
    }

    /// Request an immutable snapshot of the current document state.
    ///
    /// Returns `None` when the engine has shut down.
    pub async fn snapshot(&self) -> Option<DocumentSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineEvent::Snapshot { reply }).await;
        rx.await.ok()
    }

    /// Subscribe to the update fanout.
    #[must_use]
    pub fn updates(&self) -> tokio::sync::broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    async fn send(&self, event: EngineEvent) {
        if self.events.send(event).await.is_err() {
            tracing::warn!("engine is gone, dropping event");
        }
    }
}

/// The engine: exclusive owner of the configuration document.
pub struct Engine<S, T, H> {
    document: ConfigDocument,
    store: S,
    transport: T,
    hub: H,
    updates: UpdateBus,
    events: mpsc::Receiver<EngineEvent>,
    link: HubLink,
}

impl<S, T, H> Engine<S, T, H>
where
    S: ConfigStore,
    T: TransportPublisher,
    H: HubCommands,
{
    /// Create an engine owning `document` and a handle for feeding it.
    ///
    /// `capacity` bounds the event channel and the update fanout.
    pub fn new(
        document: ConfigDocument,
        store: S,
        transport: T,
        hub: H,
        capacity: usize,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let updates = UpdateBus::new(capacity);
        let handle = EngineHandle {
            events: tx,
            updates: updates.clone(),
        };
        let engine = Self {
            document,
            store,
            transport,
            hub,
            updates,
            events: rx,
            link: HubLink::default(),
        };
        (engine, handle)
    }

    /// Run the serialized event loop until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }
        tracing::debug!("engine event channel closed, stopping");
    }

    fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Transport { topic, payload } => self.on_transport(&topic, &payload),
            EngineEvent::HubConnected => {
                tracing::info!("hub connected, awaiting bootstrap");
                self.link = HubLink::Connected;
            }
            EngineEvent::HubPower { off } => self.on_hub_power(off),
            EngineEvent::HubActivities {
                current,
                activities,
            } => self.on_hub_activities(current, activities),
            EngineEvent::HubDigest(digest) => self.on_hub_digest(&digest),
            EngineEvent::Command(command) => self.on_command(command),
            EngineEvent::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            devices: self.document.devices.clone(),
            hub: self.document.harmony.clone(),
        }
    }

    fn on_transport(&mut self, topic: &str, payload: &[u8]) {
        let Some(route) = router::route(&self.document.devices, topic) else {
            tracing::debug!(topic, "no handler for topic");
            return;
        };
        let result = reconcile::apply(
            &mut self.document.devices[route.device_index],
            route.message,
            payload,
            now_millis(),
        );
        match result {
            Ok(()) => {
                let record = self.document.devices[route.device_index].clone();
                tracing::info!(
                    topic,
                    device = %record.name,
                    kind = record.kind.name(),
                    "device state reconciled"
                );
                self.store.persist(&self.document);
                self.updates.device_changed(record);
            }
            Err(err) => {
                tracing::warn!(topic, %err, "dropping undecodable payload");
            }
        }
    }

    fn on_hub_power(&mut self, off: bool) {
        // Bootstrap-only path: the status flip is neither persisted nor
        // broadcast, matching the activity-list resolution that follows it.
        self.document.harmony.set_power(off);
        tracing::info!(off, "hub power state resolved");
    }

    fn on_hub_activities(&mut self, current: i64, activities: Vec<ActivityInfo>) {
        self.document.harmony.rebuild_activities(current, activities);
        self.link = HubLink::Ready;
        tracing::info!(
            activities = self.document.harmony.activities.len(),
            "hub activity list rebuilt"
        );
        // Bootstrap persists but does not broadcast.
        self.store.persist(&self.document);
    }

    fn on_hub_digest(&mut self, digest: &StateDigest) {
        // Serialization here is for logging only; a failure is tolerated.
        match serde_json::to_string(digest) {
            Ok(json) => tracing::debug!(digest = %json, "hub digest received"),
            Err(err) => tracing::warn!(%err, "could not serialize hub digest for logging"),
        }
        if self.link != HubLink::Ready {
            tracing::debug!("dropping hub digest received before bootstrap completed");
            return;
        }
        if self.document.harmony.apply_digest(digest) {
            self.store.persist(&self.document);
            self.updates.hub_changed(self.document.harmony.clone());
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Publish { topic, body } => self.transport.publish(&topic, &body),
            Command::SetActivity { activity_id } => self.hub.start_activity(activity_id),
            Command::PowerOff => self.hub.power_off(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hauslink_domain::device::{DeviceKind, SwitchStatus};
    use hauslink_domain::hub::HubStatus;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<ConfigDocument>>,
    }

    impl ConfigStore for RecordingStore {
        fn persist(&self, document: &ConfigDocument) {
            self.writes.lock().unwrap().push(document.clone());
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(String, String)>>,
    }

    impl TransportPublisher for RecordingTransport {
        fn publish(&self, topic: &str, body: &str) {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), body.to_string()));
        }
    }

    #[derive(Default)]
    struct RecordingHub {
        started: Mutex<Vec<i64>>,
        power_offs: Mutex<usize>,
    }

    impl HubCommands for RecordingHub {
        fn start_activity(&self, activity_id: i64) {
            self.started.lock().unwrap().push(activity_id);
        }

        fn power_off(&self) {
            *self.power_offs.lock().unwrap() += 1;
        }
    }

    fn document() -> ConfigDocument {
        serde_json::from_value(json!({
            "mqtt": { "url": "mqtt.local:1883" },
            "harmony": { "url": "hub.local", "status": "off", "activities": [] },
            "port": 3000,
            "devices": [
                { "name": "Board", "baseURL": "/r1", "type": "relay",
                  "states": [false, false, false, false, false, false, false, false] },
                { "name": "Terrasse", "baseURL": "/sonoff1", "type": "switch" }
            ]
        }))
        .unwrap()
    }

    struct Harness {
        handle: EngineHandle,
        store: Arc<RecordingStore>,
        transport: Arc<RecordingTransport>,
        hub: Arc<RecordingHub>,
    }

    fn spawn_engine() -> Harness {
        let store = Arc::new(RecordingStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let hub = Arc::new(RecordingHub::default());
        let (engine, handle) = Engine::new(
            document(),
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&hub),
            16,
        );
        tokio::spawn(engine.run());
        Harness {
            handle,
            store,
            transport,
            hub,
        }
    }

    #[tokio::test]
    async fn should_persist_and_broadcast_once_per_reconciled_message() {
        let h = spawn_engine();
        let mut updates = h.handle.updates();

        h.handle
            .transport_message("/r1/switch/3".to_string(), br#"{"state":true}"#.to_vec())
            .await;

        let Update::Device(record) = updates.recv().await.unwrap() else {
            panic!("expected a device update");
        };
        assert_eq!(record.name, "Board");
        let DeviceKind::Relay(relay) = &record.kind else {
            panic!("expected a relay record");
        };
        let expected: Vec<serde_json::Value> = (0..8).map(|i| json!(i == 2)).collect();
        assert_eq!(relay.states, expected);

        let writes = h.store.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
    }

    #[tokio::test]
    async fn should_not_mutate_anything_on_routing_miss() {
        let h = spawn_engine();

        h.handle
            .transport_message("/r1/switch/9".to_string(), br#"{"state":true}"#.to_vec())
            .await;

        let snapshot = h.handle.snapshot().await.unwrap();
        let DeviceKind::Relay(relay) = &snapshot.devices[0].kind else {
            panic!("expected a relay record");
        };
        assert!(relay.states.iter().all(|s| s == &json!(false)));
        assert!(h.store.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_drop_malformed_payload_without_side_effects() {
        let h = spawn_engine();

        h.handle
            .transport_message("/sonoff1/switch".to_string(), b"not json".to_vec())
            .await;

        let snapshot = h.handle.snapshot().await.unwrap();
        let DeviceKind::Switch(switch) = &snapshot.devices[1].kind else {
            panic!("expected a switch record");
        };
        assert_eq!(switch.status, SwitchStatus::Unknown);
        assert!(h.store.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_persist_but_not_broadcast_bootstrap_activity_list() {
        let h = spawn_engine();
        let mut updates = h.handle.updates();

        h.handle.hub_connected().await;
        h.handle.hub_power(false).await;
        h.handle
            .hub_activities(
                5,
                vec![
                    ActivityInfo {
                        id: -1,
                        label: "PowerOff".to_string(),
                    },
                    ActivityInfo {
                        id: 5,
                        label: "Watch TV".to_string(),
                    },
                ],
            )
            .await;

        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.hub.status, HubStatus::On);
        assert_eq!(snapshot.hub.activities.len(), 1);
        assert!(snapshot.hub.activities[0].selected);
        assert!(snapshot.hub.power.is_some());

        // One persistence write for the activity list, none for the power
        // resolution, and no hub broadcast on the bootstrap path.
        assert_eq!(h.store.writes.lock().unwrap().len(), 1);
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_apply_digest_only_after_bootstrap() {
        let h = spawn_engine();
        let mut updates = h.handle.updates();

        let digest = StateDigest {
            error_code: "200".to_string(),
            activity_status: 2,
            activity_id: 5,
        };

        h.handle.hub_connected().await;
        h.handle.hub_digest(digest.clone()).await;
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.hub.status, HubStatus::Off);

        h.handle
            .hub_activities(
                -1,
                vec![ActivityInfo {
                    id: 5,
                    label: "Watch TV".to_string(),
                }],
            )
            .await;
        h.handle.hub_digest(digest).await;

        let Update::Hub(hub) = updates.recv().await.unwrap() else {
            panic!("expected a hub update");
        };
        assert_eq!(hub.status, HubStatus::On);
        assert!(hub.activities.iter().all(|a| a.selected == (a.id == 5)));
        // Bootstrap write + digest write.
        assert_eq!(h.store.writes.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_ignore_digest_with_unexpected_status_without_side_effects() {
        let h = spawn_engine();
        let mut updates = h.handle.updates();

        h.handle.hub_connected().await;
        h.handle.hub_activities(-1, vec![]).await;
        h.handle
            .hub_digest(StateDigest {
                error_code: "200".to_string(),
                activity_status: 7,
                activity_id: 5,
            })
            .await;

        // Only the bootstrap write; the digest was a no-op.
        let _ = h.handle.snapshot().await.unwrap();
        assert_eq!(h.store.writes.lock().unwrap().len(), 1);
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_forward_commands_to_collaborators_without_state_changes() {
        let h = spawn_engine();
        let before = h.handle.snapshot().await.unwrap();

        h.handle
            .command(Command::Publish {
                topic: "/r1/cmd/1".to_string(),
                body: "{\"state\":true}".to_string(),
            })
            .await;
        h.handle
            .command(Command::SetActivity { activity_id: 5 })
            .await;
        h.handle.command(Command::PowerOff).await;

        let after = h.handle.snapshot().await.unwrap();
        assert_eq!(after.devices, before.devices);
        assert_eq!(after.hub, before.hub);

        assert_eq!(
            h.transport.published.lock().unwrap().as_slice(),
            &[("/r1/cmd/1".to_string(), "{\"state\":true}".to_string())]
        );
        assert_eq!(h.hub.started.lock().unwrap().as_slice(), &[5]);
        assert_eq!(*h.hub.power_offs.lock().unwrap(), 1);
        assert!(h.store.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_serve_snapshot_with_devices_and_hub() {
        let h = spawn_engine();
        let snapshot = h.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.devices.len(), 2);
        assert_eq!(snapshot.hub.url, "hub.local");
    }
}
