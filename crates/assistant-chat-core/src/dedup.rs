//! Replay suppression for inbound frames.

use std::collections::HashSet;

use crate::message::{DedupKey, InboundFrame};

/// Decides whether an inbound frame has already been processed.
///
/// The transport may deliver the same logical frame more than once
/// (reconnect replay, at-least-once delivery upstream); the session
/// must treat repeats as no-ops. Two frames with identical content are
/// indistinguishable and count as one logical event even if the peer
/// sent both intentionally.
///
/// The seen set grows monotonically for the lifetime of the session;
/// there is no eviction.
#[derive(Debug, Default)]
pub struct FrameDeduplicator {
    seen: HashSet<DedupKey>,
}

impl FrameDeduplicator {
    /// Create an empty deduplicator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once per distinct frame content, and
    /// records the frame as seen.
    pub fn should_process(&mut self, frame: &InboundFrame) -> bool {
        self.seen.insert(frame.dedup_key())
    }

    /// Number of distinct frames seen so far.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
