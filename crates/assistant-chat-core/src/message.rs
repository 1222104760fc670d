//! Chat messages and the inbound wire frame.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque structured result record (e.g. a property listing).
///
/// Forwarded verbatim to the display collaborator; this crate never
/// interprets its fields.
pub type ResultRecord = serde_json::Value;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The local user.
    User,
    /// The remote assistant.
    Bot,
}

/// One entry in the conversation log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message text.
    pub text: String,
    /// Message author.
    pub sender: Sender,
    /// Creation time (Unix epoch milliseconds). `None` exempts the
    /// entry from eviction.
    pub created_at: Option<i64>,
}

impl ChatMessage {
    /// Create a user message stamped with the current time.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            created_at: Some(now_millis()),
        }
    }

    /// Create an assistant message stamped with the current time.
    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            created_at: Some(now_millis()),
        }
    }
}

/// Current time as Unix epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// One inbound payload from the assistant peer.
///
/// Transient: consumed and discarded after dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Assistant reply text.
    pub message: String,
    /// Result records for the display collaborator, possibly empty.
    #[serde(default)]
    pub properties: Vec<ResultRecord>,
}

impl InboundFrame {
    /// Parse a raw text frame.
    ///
    /// # Errors
    /// Returns the underlying error if the payload is not the expected
    /// JSON shape.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Content fingerprint for deduplication.
    ///
    /// Canonical serialization of the parsed frame: whitespace and
    /// object-key order in the raw payload do not affect the key,
    /// record order does.
    #[must_use]
    pub fn dedup_key(&self) -> DedupKey {
        // Serialization of an already-parsed frame cannot fail.
        DedupKey(serde_json::to_string(self).unwrap_or_default())
    }
}

/// Canonical fingerprint of an [`InboundFrame`]'s full content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(pub(crate) String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_frame() {
        let frame =
            InboundFrame::parse(r#"{"message":"hi","properties":[{"id":1}]}"#).unwrap();
        assert_eq!(frame.message, "hi");
        assert_eq!(frame.properties.len(), 1);
    }

    #[test]
    fn missing_properties_defaults_to_empty() {
        let frame = InboundFrame::parse(r#"{"message":"hi"}"#).unwrap();
        assert!(frame.properties.is_empty());
    }

    #[test]
    fn malformed_frame_is_rejected() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"properties":[]}"#).is_err());
    }

    #[test]
    fn key_ignores_whitespace_and_object_key_order() {
        let a = InboundFrame::parse(r#"{"message":"hi","properties":[{"id":1,"city":"Prague"}]}"#)
            .unwrap();
        let b = InboundFrame::parse(
            r#"{ "properties": [ {"city":"Prague", "id":1} ], "message": "hi" }"#,
        )
        .unwrap();
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn key_is_sensitive_to_record_order() {
        let a = InboundFrame::parse(r#"{"message":"hi","properties":[{"id":1},{"id":2}]}"#)
            .unwrap();
        let b = InboundFrame::parse(r#"{"message":"hi","properties":[{"id":2},{"id":1}]}"#)
            .unwrap();
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn constructors_stamp_timestamps() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.sender, Sender::User);
        assert!(msg.created_at.is_some());
    }
}
