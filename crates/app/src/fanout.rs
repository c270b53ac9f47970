//! Update fanout backed by a tokio broadcast channel.

use tokio::sync::broadcast;

use hauslink_domain::device::DeviceRecord;
use hauslink_domain::hub::HubState;

/// One state change fanned out to realtime subscribers.
#[derive(Debug, Clone)]
pub enum Update {
    /// A single device record changed.
    Device(DeviceRecord),
    /// The hub state changed.
    Hub(HubState),
}

/// In-process update bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the update is simply dropped).
#[derive(Debug, Clone)]
pub struct UpdateBus {
    sender: broadcast::Sender<Update>,
}

impl UpdateBus {
    /// Create a new update bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to updates on this bus.
    ///
    /// Returns a receiver that will get all updates published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.sender.subscribe()
    }

    /// Fan out a mutated device record.
    pub fn device_changed(&self, record: DeviceRecord) {
        // broadcast::send fails only when there are zero receivers,
        // which is fine — the update is simply dropped.
        let _ = self.sender.send(Update::Device(record));
    }

    /// Fan out the mutated hub state.
    pub fn hub_changed(&self, hub: HubState) {
        let _ = self.sender.send(Update::Hub(hub));
    }
}
