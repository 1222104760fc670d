//! Session configuration.

use std::time::Duration;

/// Configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Channel endpoint URL (`ws://` or `wss://` depending on the
    /// host's transport security).
    pub url: String,
    /// Fixed delay between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Consecutive failed attempts tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Maximum age a conversation entry may reach before eviction.
    pub retention_window: Duration,
    /// How often the eviction sweep runs.
    pub eviction_interval: Duration,
}

impl ChatConfig {
    /// Configuration with the default timing parameters.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 10,
            retention_window: Duration::from_secs(5 * 60),
            eviction_interval: Duration::from_secs(60),
        }
    }
}
