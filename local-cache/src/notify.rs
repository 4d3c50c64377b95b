//! Same-process "collection updated" signal.
//!
//! Not persisted and not shared across processes. Sends with no subscriber
//! are dropped.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectionChange {
    Added { id: String },
    Removed { id: String },
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionEvent {
    pub collection: String,
    pub change: CollectionChange,
    /// Collection size after the change.
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<CollectionEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, collection: &str, change: CollectionChange, len: usize) {
        let event = CollectionEvent {
            collection: collection.to_string(),
            change,
            len,
        };
        tracing::trace!(?event, "collection changed");
        // Err only means nobody is subscribed.
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
