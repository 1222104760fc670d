//! Line-oriented chat host.
//!
//! Run with: cargo run -p terminal-chat-demo -- ws://localhost:8090/chatbot
//!
//! Type a message and press enter; `/clear` empties the conversation,
//! `/quit` closes the channel and exits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use assistant_chat_core::{ChatConfig, ResultRecord, ResultsSink, Sender};
use assistant_chat_session::{ChatSession, SessionState};

/// Prints forwarded result records instead of rendering cards.
struct PrintSink;

#[async_trait]
impl ResultsSink for PrintSink {
    async fn forward(&self, records: Vec<ResultRecord>) {
        println!("--- {} listing(s) received ---", records.len());
        for record in records {
            println!("  {record}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:8090/chatbot".into());

    let session = ChatSession::new(ChatConfig::new(url), Arc::new(PrintSink));
    session.open();

    // Follow the conversation as it grows.
    let mut live = session.store().subscribe();
    tokio::spawn(async move {
        while let Ok(msg) = live.recv().await {
            if msg.sender == Sender::Bot {
                println!("assistant: {}", msg.text);
            }
        }
    });

    let mut states = session.state_changes();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow();
            tracing::info!(?state, "session state changed");
            if state == SessionState::Terminated {
                tracing::warn!("session terminated; /quit to exit");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/clear" => session.clear_conversation(),
            text => {
                if let Err(e) = session.send(text) {
                    tracing::warn!("message not transmitted: {e}");
                }
            }
        }
    }

    session.close();
    Ok(())
}
