//! Broadcast feed for streamed assistant message snapshots.
//!
//! Built on `tokio::sync::broadcast`, the `MessageFeed` is what chat service
//! implementations publish streaming output onto. Publishing with no active
//! subscribers is a no-op.

use parley_types::chat::Message;
use tokio::sync::broadcast;

/// Default number of snapshots buffered per subscriber before it lags.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Multi-consumer feed of streamed `Message` snapshots.
///
/// Cloning the feed clones the sender, so a service can hand a clone to its
/// transport task and keep one for `subscribe`.
pub struct MessageFeed {
    sender: broadcast::Sender<Message>,
}

impl MessageFeed {
    /// Create a new feed with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    /// Publish a snapshot to all current subscribers.
    ///
    /// If there are no subscribers, the snapshot is silently dropped.
    pub fn publish(&self, message: Message) {
        let _ = self.sender.send(message);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl Clone for MessageFeed {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for MessageFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageFeed")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
