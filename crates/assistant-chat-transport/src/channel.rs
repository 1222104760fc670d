//! Channel transport: one logical WebSocket connection with retry.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt, stream::BoxStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Broadcast capacity for transport events.
const EVENT_CAPACITY: usize = 256;

/// Connection state of the channel.
///
/// Transitions only along Connecting -> Open -> Closing -> Closed,
/// Open -> Connecting on an unexpected drop before reconnect, or
/// Connecting -> Closing when the channel is shut down (close or
/// exhaustion) before it ever opened. Open is never reached from
/// Closed without passing through Connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection attempt (or a retry) in progress.
    Connecting,
    /// Channel is up; `send` is accepted.
    Open,
    /// Shutdown in progress.
    Closing,
    /// Terminal: closed by the caller or retries exhausted.
    Closed,
}

/// Event emitted by the transport run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established.
    Opened,
    /// Raw text frame received from the peer.
    Frame(String),
    /// Transient socket or connect error; the retry machinery handles it.
    Error(String),
    /// Connection ended (peer close, socket drop, or local close).
    Closed,
    /// Terminal: consecutive reconnection attempts exceeded the bound.
    Exhausted,
}

/// Transport error surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `send` attempted while the channel is not open. Outbound
    /// messages are not buffered across reconnects; the caller must
    /// queue or drop.
    #[error("channel is not connected")]
    NotConnected,
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint URL.
    pub url: String,
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Consecutive failed attempts tolerated before `Exhausted`.
    pub max_reconnect_attempts: u32,
}

/// Handle to one logical WebSocket connection.
///
/// Clones share the same connection and run loop, so several consumers
/// (a UI toggling visibility, the session) never open duplicate
/// sockets. The connection is torn down when [`close`](Self::close) is
/// called or the last handle is dropped.
#[derive(Clone)]
pub struct ChannelTransport {
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ChannelTransport {
    /// Start connecting to `config.url` and spawn the run loop.
    ///
    /// Returns the handle together with an event receiver subscribed
    /// before the first connection attempt, so no event can be missed.
    #[must_use]
    pub fn connect(config: ChannelConfig) -> (Self, broadcast::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_loop(
            config,
            state_tx,
            events_tx.clone(),
            outbound_rx,
            shutdown_rx,
        ));

        (
            Self {
                state: state_rx,
                events: events_tx,
                outbound: outbound_tx,
                shutdown: Arc::new(shutdown_tx),
            },
            events_rx,
        )
    }

    /// Send raw UTF-8 text to the peer.
    ///
    /// # Errors
    /// Fails fast with [`TransportError::NotConnected`] unless the
    /// channel is open.
    pub fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        if *self.state.borrow() != ConnectionState::Open {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(text.into())
            .map_err(|_| TransportError::NotConnected)
    }

    /// Close the channel. Idempotent; cancels any pending reconnect.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch receiver for state transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to transport events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Transport events as a stream. Lagged events are skipped.
    #[must_use]
    pub fn event_stream(&self) -> BoxStream<'static, TransportEvent> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move { res.ok() })
            .boxed()
    }
}

async fn run_loop(
    config: ChannelConfig,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    'outer: loop {
        if *shutdown_rx.borrow() {
            break;
        }
        state.send_replace(ConnectionState::Connecting);

        match connect_async(config.url.as_str()).await {
            Ok((ws, _)) => {
                failures = 0;
                // No buffering across reconnects: anything queued while
                // the channel was down is dropped.
                let mut dropped = 0_usize;
                while outbound_rx.try_recv().is_ok() {
                    dropped += 1;
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "outbound frames discarded on reconnect");
                }

                state.send_replace(ConnectionState::Open);
                let _ = events.send(TransportEvent::Opened);
                tracing::debug!(url = %config.url, "channel opened");

                let (mut sink, mut stream) = ws.split();
                loop {
                    tokio::select! {
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                state.send_replace(ConnectionState::Closing);
                                let _ = sink.send(Message::Close(None)).await;
                                let _ = events.send(TransportEvent::Closed);
                                break 'outer;
                            }
                        }
                        Some(text) = outbound_rx.recv() => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                tracing::warn!("channel send failed: {e}");
                                let _ = events.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        inbound = stream.next() => match inbound {
                            Some(Ok(Message::Text(text))) => {
                                let _ = events.send(TransportEvent::Frame(text.to_string()));
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {} // binary, ping and pong are ignored
                            Some(Err(e)) => {
                                tracing::warn!("channel error: {e}");
                                let _ = events.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                    }
                }
                let _ = events.send(TransportEvent::Closed);
                // Unexpected drop: back to Connecting for the retry.
                state.send_replace(ConnectionState::Connecting);
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    attempt = failures,
                    max = config.max_reconnect_attempts,
                    "connect failed: {e}"
                );
                let _ = events.send(TransportEvent::Error(e.to_string()));
                if failures >= config.max_reconnect_attempts {
                    tracing::warn!("reconnect attempts exhausted, giving up");
                    let _ = events.send(TransportEvent::Exhausted);
                    break;
                }
            }
        }

        // Fixed retry interval, cancellable by close().
        tokio::select! {
            () = tokio::time::sleep(config.reconnect_interval) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    state.send_replace(ConnectionState::Closing);
    state.send_replace(ConnectionState::Closed);
}
