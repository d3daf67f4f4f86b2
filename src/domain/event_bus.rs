//! Fan-out of store lifecycle events to the host.
//!
//! The store client publishes a [`StoreEvent`] on every connection change.
//! The host subscribes once and reacts to [`StoreEvent::Disabled`] by
//! switching persistence off.

use tokio::sync::broadcast;

use super::StoreEvent;

/// Broadcast bus for [`StoreEvent`]s.
///
/// Lagging subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes `event` and returns how many subscribers will see it.
    ///
    /// With nobody subscribed the event is dropped and `0` is returned.
    pub fn publish(&self, event: StoreEvent) -> usize {
        let kind = event.event_type_str();
        let at = event.timestamp();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(event = kind, %at, delivered, "store event published");
        delivered
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }
}
