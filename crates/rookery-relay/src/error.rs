//! Error types for the chat relay.

use thiserror::Error;

/// Chat relay errors.
///
/// Every failure in the relay is contained to the connection or message
/// that caused it; none of these variants is allowed to take down the
/// process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO error (network, file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level error, local to one connection
    #[error("Transport error: {0}")]
    Transport(String),

    /// A frame that could not be decoded as a chat message
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Persistence backend error (logged, never fatal to delivery)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The registry control task has shut down and accepts no more commands
    #[error("Connection registry is closed")]
    RegistryClosed,
}

impl RelayError {
    /// Create a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new malformed-frame error.
    pub fn malformed_frame(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Create a new storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedFrame(e.to_string())
    }
}
