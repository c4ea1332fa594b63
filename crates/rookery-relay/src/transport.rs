//! The transport seam.
//!
//! Transport upgrade and framing live outside the relay. The pumps consume
//! these two traits, one per half of a split bidirectional connection; the
//! host adapts its concrete transport (a WebSocket, in practice) to them,
//! and tests substitute channel-backed fakes.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::ChatMessage;

/// The receiving half of a message transport.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Read the next message frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly. Any
    /// transport failure or undecodable frame is an error and terminates
    /// the connection it belongs to, nothing more.
    async fn next_frame(&mut self) -> Result<Option<ChatMessage>, RelayError>;
}

/// The sending half of a message transport.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write one message frame.
    async fn write_frame(&mut self, message: &ChatMessage) -> Result<(), RelayError>;

    /// Tell the peer the connection is going away. Best-effort: called
    /// during teardown when the transport may already be dead.
    async fn write_close(&mut self) -> Result<(), RelayError>;
}
