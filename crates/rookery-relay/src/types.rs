//! Common types for the chat relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RelayError;

/// Opaque user identity.
///
/// The relay never looks inside this value; it is whatever stable
/// identifier the authentication layer hands over when a transport is
/// upgraded. Two connections belong to the same user exactly when their
/// `UserId`s compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId(s)
    }
}

/// A point-to-point chat message as it appears on the wire.
///
/// One transport frame carries exactly one of these, JSON-encoded. The
/// field names are the wire contract and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identity of the sending user
    pub sender_id: UserId,
    /// Identity of the intended receiver
    pub receiver_id: UserId,
    /// Message body
    pub content: String,
}

impl ChatMessage {
    /// Create a new chat message.
    pub fn new(sender_id: impl Into<UserId>, receiver_id: impl Into<UserId>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            content: content.into(),
        }
    }

    /// Encode this message as a JSON wire frame.
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON wire frame into a message.
    pub fn from_json(frame: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(frame)?)
    }
}

/// A message as handed to the persistence store.
///
/// Built by the inbound pump from a decoded [`ChatMessage`]; carries the
/// archive identity and creation time that the wire frame does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique record ID (UUID v7, time-sortable)
    pub id: Uuid,
    /// Identity of the sending user
    pub sender_id: UserId,
    /// Identity of the intended receiver
    pub receiver_id: UserId,
    /// Message body
    pub content: String,
    /// Timestamp when the relay accepted the message
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Create a record for a freshly received message.
    pub fn new(message: &ChatMessage) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id: message.sender_id.clone(),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            created_at: Utc::now(),
        }
    }
}
