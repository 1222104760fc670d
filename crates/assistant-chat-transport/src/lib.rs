//! WebSocket channel client for the assistant peer.
//!
//! Provides:
//! - `ChannelTransport` - connect, send, close, automatic retry
//! - `TransportEvent` - the event stream consumed by the session
//! - `ConnectionState` - single authoritative connection state

pub mod channel;

pub use channel::{
    ChannelConfig, ChannelTransport, ConnectionState, TransportError, TransportEvent,
};
