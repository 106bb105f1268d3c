//! Publish-only event bus for client-initiated mutations

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::StateEvent;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fire-and-forget publisher of mutation events.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: StateEvent);
}

/// Event bus backed by a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct ChannelEventBus {
    tx: broadcast::Sender<StateEvent>,
}

impl ChannelEventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChannelEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: StateEvent) {
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            debug!("Event published with no subscribers");
        }
    }
}
