//! Ordered conversation log with time-based eviction.

use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::message::ChatMessage;

/// Broadcast capacity for live append listeners.
const LIVE_CAPACITY: usize = 256;

/// The ordered log of chat entries.
///
/// Appends are broadcast to live listeners so a reactive UI can follow
/// the conversation without polling `snapshot`. The store does not
/// deduplicate; gating repeats is the deduplicator's job.
pub struct ConversationStore {
    inner: RwLock<Vec<ChatMessage>>,
    sender: broadcast::Sender<ChatMessage>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            inner: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Append a message at the end, preserving chronological order.
    pub fn append(&self, msg: ChatMessage) {
        let _ = self.sender.send(msg.clone()); // live listeners
        self.inner.write().unwrap().push(msg);
    }

    /// Remove entries created before `cutoff_millis`.
    ///
    /// Entries with no timestamp are never evicted.
    pub fn evict_older_than(&self, cutoff_millis: i64) {
        let mut inner = self.inner.write().unwrap();
        let before = inner.len();
        inner.retain(|m| m.created_at.is_none_or(|t| t >= cutoff_millis));
        let evicted = before - inner.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired conversation entries removed");
        }
    }

    /// Remove all entries immediately.
    pub fn clear(&self) {
        self.inner.write().unwrap().clear();
    }

    /// Ordered copy of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.inner.read().unwrap().clone()
    }

    /// Subscribe to live appends.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatMessage> {
        self.sender.subscribe()
    }

    /// Number of entries currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }
}
