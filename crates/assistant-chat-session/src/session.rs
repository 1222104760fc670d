//! The chat session state machine.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use assistant_chat_core::{
    ChatConfig, ChatMessage, ConversationStore, FrameDeduplicator, InboundFrame,
    ResultDispatcher, ResultsSink, message::now_millis,
};
use assistant_chat_transport::{
    ChannelConfig, ChannelTransport, TransportError, TransportEvent,
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket not yet requested.
    Idle,
    /// First connection attempt in progress.
    Connecting,
    /// Channel open, frames flowing.
    Active,
    /// Channel dropped, retry attempts remain.
    Reconnecting,
    /// Terminal: user close or reconnect attempts exhausted. A new
    /// session must be constructed to retry.
    Terminated,
}

/// Session error surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport rejected the operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

struct Runtime {
    transport: ChannelTransport,
    task: JoinHandle<()>,
}

/// Orchestrates one logical conversation with the assistant peer.
///
/// All transport events, eviction ticks and frame handling run on a
/// single event-loop task, one complete handler at a time, so the
/// deduplicator needs no locking and frames are processed in delivery
/// order.
pub struct ChatSession {
    config: ChatConfig,
    store: Arc<ConversationStore>,
    dispatcher: Arc<ResultDispatcher>,
    state: Arc<watch::Sender<SessionState>>,
    runtime: Mutex<Option<Runtime>>,
}

impl ChatSession {
    /// Create an idle session. No socket is opened until [`open`]
    /// (or the first [`send`]) is called.
    ///
    /// [`open`]: Self::open
    /// [`send`]: Self::send
    #[must_use]
    pub fn new(config: ChatConfig, sink: Arc<dyn ResultsSink>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            config,
            store: Arc::new(ConversationStore::new()),
            dispatcher: Arc::new(ResultDispatcher::new(sink)),
            state: Arc::new(state),
            runtime: Mutex::new(None),
        }
    }

    /// Open the channel. Idempotent; a no-op once terminated.
    pub fn open(&self) {
        let mut runtime = self.runtime.lock().unwrap();
        self.ensure_started(&mut runtime);
    }

    /// Send the user's message.
    ///
    /// The user entry is appended to the conversation immediately
    /// (user-originated messages are always new, never dedup-gated) and
    /// the raw text is handed to the transport. Opens the channel on
    /// first use.
    ///
    /// # Errors
    /// [`TransportError::NotConnected`] when the channel is not open;
    /// the message then stays in the store but is not transmitted.
    /// There is no outbound retry.
    pub fn send(&self, text: &str) -> Result<(), SessionError> {
        self.store.append(ChatMessage::user(text));

        let mut runtime = self.runtime.lock().unwrap();
        self.ensure_started(&mut runtime);
        match runtime.as_ref() {
            Some(rt) => rt.transport.send(text).map_err(SessionError::from),
            None => Err(TransportError::NotConnected.into()),
        }
    }

    /// Remove all conversation entries immediately.
    ///
    /// Does not touch the transport or the deduplicator's seen set.
    pub fn clear_conversation(&self) {
        self.store.clear();
    }

    /// Terminate the session: closes the shared socket unconditionally
    /// and cancels the eviction sweep and any pending reconnect.
    /// Idempotent.
    pub fn close(&self) {
        if let Some(rt) = self.runtime.lock().unwrap().take() {
            rt.transport.close();
            rt.task.abort();
        }
        self.state.send_replace(SessionState::Terminated);
    }

    /// The conversation log. Collaborators read snapshots or subscribe
    /// to live appends; they never mutate.
    #[must_use]
    pub fn store(&self) -> Arc<ConversationStore> {
        Arc::clone(&self.store)
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch receiver for state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn ensure_started(&self, runtime: &mut Option<Runtime>) {
        if runtime.is_some() || self.state() != SessionState::Idle {
            return;
        }

        let channel_config = ChannelConfig {
            url: self.config.url.clone(),
            reconnect_interval: self.config.reconnect_interval,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
        };
        let (transport, events) = ChannelTransport::connect(channel_config);
        self.state.send_replace(SessionState::Connecting);

        let task = tokio::spawn(run_events(
            events,
            Arc::clone(&self.store),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.state),
            self.config.clone(),
        ));

        *runtime = Some(Runtime { transport, task });
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_events(
    mut events: broadcast::Receiver<TransportEvent>,
    store: Arc<ConversationStore>,
    dispatcher: Arc<ResultDispatcher>,
    state: Arc<watch::Sender<SessionState>>,
    config: ChatConfig,
) {
    let mut dedup = FrameDeduplicator::new();
    let mut sweep = tokio::time::interval(config.eviction_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    sweep.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(TransportEvent::Opened) => {
                    state.send_replace(SessionState::Active);
                }
                Ok(TransportEvent::Frame(raw)) => {
                    handle_frame(&raw, &mut dedup, &store, &dispatcher).await;
                }
                Ok(TransportEvent::Error(_) | TransportEvent::Closed) => {
                    // Transient while attempts remain; stay Connecting
                    // during the initial dial.
                    if *state.borrow() == SessionState::Active {
                        state.send_replace(SessionState::Reconnecting);
                    }
                }
                Ok(TransportEvent::Exhausted) => {
                    tracing::warn!("connection exhausted, terminating session");
                    state.send_replace(SessionState::Terminated);
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "transport events lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = sweep.tick() => {
                let retention =
                    i64::try_from(config.retention_window.as_millis()).unwrap_or(i64::MAX);
                store.evict_older_than(now_millis() - retention);
            }
        }
    }
}

async fn handle_frame(
    raw: &str,
    dedup: &mut FrameDeduplicator,
    store: &ConversationStore,
    dispatcher: &ResultDispatcher,
) {
    let frame = match InboundFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => {
            // Best effort: drop the frame, keep the session alive.
            tracing::warn!("malformed frame dropped: {e}");
            return;
        }
    };

    if !dedup.should_process(&frame) {
        tracing::debug!("duplicate frame suppressed");
        return;
    }

    store.append(ChatMessage::bot(frame.message.clone()));
    dispatcher.dispatch(&frame).await;
}
