//! # rookery-relay
//!
//! Real-time chat relay library for Rookery.
//!
//! This crate implements the point-to-point message relay that routes chat
//! messages between concurrently connected users, designed to be embedded
//! in `rookery-server` for unified deployment.
//!
//! ## Architecture
//!
//! - **Registry**: single control task owning the map of who is online;
//!   register/unregister/lookup arrive as commands over a channel
//! - **Router**: resolves a message's receiver in the registry and forwards
//!   it onto that connection's bounded outbound queue, never blocking on a
//!   transport
//! - **Session Pumps**: one inbound and one outbound loop per connection,
//!   driven by [`session::handle_session`]
//! - **Seams**: transport framing ([`transport`]) and message history
//!   ([`store`]) are traits the host implements
//!
//! Delivery is presence-gated and best-effort: messages to users who are
//! not connected are persisted but not delivered, and a slow receiver only
//! ever loses its own messages.

pub mod config;
pub mod connection;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod session;
pub mod store;
pub mod transport;

mod error;
mod types;

pub use config::{RelayConfig, DEFAULT_COMMAND_BUFFER, DEFAULT_QUEUE_CAPACITY};
pub use connection::{ConnectionHandle, ConnectionId, EnqueueResult};
pub use error::RelayError;
pub use registry::ConnectionRegistry;
pub use routing::{MessageRouter, RouteOutcome};
pub use session::handle_session;
pub use store::MessageStore;
pub use transport::{FrameReader, FrameWriter};
pub use types::{ChatMessage, MessageRecord, UserId};
