//! Core building blocks for the assistant chat client.
//!
//! This crate provides the pieces the session orchestrator composes:
//! - `ChatMessage` / `InboundFrame` - the data model
//! - `FrameDeduplicator` - replay suppression for inbound frames
//! - `ConversationStore` - ordered chat log with time-based eviction
//! - `ResultDispatcher` / `ResultsSink` - handoff of result records
//! - `ChatConfig` - channel and retention configuration

pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod message;
pub mod store;

pub use config::ChatConfig;
pub use dedup::FrameDeduplicator;
pub use dispatch::{ChannelSink, ResultDispatcher, ResultsSink};
pub use message::{ChatMessage, DedupKey, InboundFrame, ResultRecord, Sender};
pub use store::ConversationStore;
