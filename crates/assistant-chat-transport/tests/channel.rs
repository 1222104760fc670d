//! Transport tests against a local WebSocket peer.

use std::time::Duration;

use assistant_chat_transport::{
    ChannelConfig, ChannelTransport, ConnectionState, TransportError, TransportEvent,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

const WAIT: Duration = Duration::from_secs(5);

fn config(url: String) -> ChannelConfig {
    ChannelConfig {
        url,
        reconnect_interval: Duration::from_millis(10),
        max_reconnect_attempts: 3,
    }
}

/// Port that nothing is listening on.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("ws://127.0.0.1:{port}")
}

async fn next_event(rx: &mut broadcast::Receiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn frames_flow_both_ways() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Peer echoes each text frame back wrapped in braces.
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            ws.send(Message::Text(format!("echo:{text}").into()))
                .await
                .unwrap();
        }
    });

    let (transport, mut events) = ChannelTransport::connect(config(format!("ws://{addr}")));

    assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
    assert_eq!(transport.state(), ConnectionState::Open);

    transport.send("hello").unwrap();
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Frame("echo:hello".into())
    );

    transport.close();
}

#[tokio::test]
async fn send_fails_fast_while_connecting() {
    let url = dead_endpoint().await;
    let (transport, _events) = ChannelTransport::connect(ChannelConfig {
        url,
        reconnect_interval: Duration::from_secs(60),
        max_reconnect_attempts: 10,
    });

    assert!(matches!(
        transport.send("hello"),
        Err(TransportError::NotConnected)
    ));
    transport.close();
}

#[tokio::test]
async fn exhausts_after_bounded_attempts() {
    let url = dead_endpoint().await;
    let (transport, mut events) = ChannelTransport::connect(config(url));

    let mut errors = 0;
    loop {
        match next_event(&mut events).await {
            TransportEvent::Error(_) => errors += 1,
            TransportEvent::Exhausted => break,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(errors, 3);

    let mut state = transport.state_changes();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .unwrap()
        .unwrap();

    // Terminal: no further attempts, sends are rejected.
    assert!(
        timeout(Duration::from_millis(100), events.recv())
            .await
            .is_err()
    );
    assert!(matches!(
        transport.send("hello"),
        Err(TransportError::NotConnected)
    ));
}

#[tokio::test]
async fn reconnects_after_peer_drop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // First connection is closed immediately.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();

        // Second connection greets the client.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text("welcome back".into())).await.unwrap();
        // Hold the socket open until the client closes.
        while ws.next().await.is_some() {}
    });

    let (transport, mut events) = ChannelTransport::connect(config(format!("ws://{addr}")));

    assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
    assert_eq!(next_event(&mut events).await, TransportEvent::Closed);
    assert_eq!(next_event(&mut events).await, TransportEvent::Opened);
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Frame("welcome back".into())
    );

    transport.close();
}

#[tokio::test]
async fn shutdown_before_open_never_reports_open() {
    let url = dead_endpoint().await;
    let (transport, _events) = ChannelTransport::connect(ChannelConfig {
        url,
        reconnect_interval: Duration::from_secs(60),
        max_reconnect_attempts: 10,
    });

    let mut states = transport.state_changes();
    transport.close();

    // Walks Connecting -> Closing -> Closed (possibly coalesced), and
    // Open must never appear.
    loop {
        let state = *states.borrow_and_update();
        assert_ne!(state, ConnectionState::Open);
        if state == ConnectionState::Closed {
            break;
        }
        timeout(WAIT, states.changed()).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn close_cancels_pending_reconnect() {
    let url = dead_endpoint().await;
    let (transport, mut events) = ChannelTransport::connect(ChannelConfig {
        url,
        reconnect_interval: Duration::from_secs(60),
        max_reconnect_attempts: 10,
    });

    // Wait for the first failed attempt, then close during the retry sleep.
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Error(_)
    ));
    transport.close();
    transport.close(); // idempotent

    let mut state = transport.state_changes();
    timeout(WAIT, state.wait_for(|s| *s == ConnectionState::Closed))
        .await
        .unwrap()
        .unwrap();
}
