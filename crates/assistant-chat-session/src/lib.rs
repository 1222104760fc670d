//! Chat session orchestration.
//!
//! Provides:
//! - `ChatSession` - consumes transport events, gates repeats, updates
//!   the conversation store and dispatches result records
//! - `SessionState` - the session lifecycle state machine

pub mod session;

pub use session::{ChatSession, SessionError, SessionState};
