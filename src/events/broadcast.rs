//! Fan-out of observed messages to stream subscribers.

use tokio::sync::broadcast;
use tracing::debug;

use crate::relay::Message;

/// Default broadcast channel capacity.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// One publish, N independent receivers. Each subscriber sees every message
/// published after it subscribed, in publish order.
#[derive(Clone)]
pub struct MessageBroadcaster {
    tx: broadcast::Sender<Message>,
}

impl MessageBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to new messages. Each stream client calls this.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, message: Message) -> usize {
        // Ok if no one is listening yet
        match self.tx.send(message) {
            Ok(n) => {
                debug!(subscribers = n, "Message broadcast");
                n
            }
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}
