//! Event bus for persistence lifecycle notifications using tokio::broadcast
//!
//! Lets embedders observe loads and flushes without polling the filesystem.

use tokio::sync::broadcast;

/// Events emitted by the stores and the sync worker
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The scalar settings file was written
    SettingsSaved,
    /// The resource metadata document was loaded from disk
    MetadataLoaded { resources: usize },
    /// A debounced flush wrote the resource metadata document
    MetadataFlushed { resources: usize },
    /// A debounced flush failed; in-memory state is unchanged
    FlushFailed(String),
}

/// Event bus for broadcasting store events
///
/// Uses tokio::broadcast for multi-consumer support; publishing with no
/// subscribers is a no-op.
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (256 events)
    pub fn default_capacity() -> Self {
        Self::new(256)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: StoreEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Get current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
