//! Handoff of structured result records to the display collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::{InboundFrame, ResultRecord};

/// External collaborator that renders result records.
///
/// The dispatcher only calls this for non-empty sequences; records are
/// passed through verbatim.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    /// Receive a batch of result records.
    async fn forward(&self, records: Vec<ResultRecord>);
}

/// Channel-backed [`ResultsSink`] for hosts that consume records from
/// an mpsc receiver.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Vec<ResultRecord>>,
}

impl ChannelSink {
    /// Create a sink and the receiver the host reads from.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<ResultRecord>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultsSink for ChannelSink {
    async fn forward(&self, records: Vec<ResultRecord>) {
        let _ = self.tx.send(records);
    }
}

/// Extracts result payloads from inbound frames and forwards them.
///
/// Stateless; performs no filtering or transformation.
pub struct ResultDispatcher {
    sink: Arc<dyn ResultsSink>,
}

impl ResultDispatcher {
    /// Create a dispatcher forwarding to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ResultsSink>) -> Self {
        Self { sink }
    }

    /// Forward the frame's records if there are any; no-op otherwise.
    pub async fn dispatch(&self, frame: &InboundFrame) {
        if frame.properties.is_empty() {
            return;
        }
        self.sink.forward(frame.properties.clone()).await;
    }
}
