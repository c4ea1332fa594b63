//! Message routing between connected users.
//!
//! The router resolves a message's receiver in the registry and forwards
//! the message onto that connection's outbound queue. Delivery is
//! presence-gated and best-effort: an absent receiver means the message is
//! silently dropped, and a full queue drops rather than blocks. The router
//! never waits on any connection's transport.

use tracing::{debug, instrument, warn};

use crate::connection::EnqueueResult;
use crate::error::RelayError;
use crate::metrics;
use crate::registry::ConnectionRegistry;
use crate::types::ChatMessage;

/// Outcome of routing a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Message was placed on the receiver's outbound queue
    Delivered,
    /// Receiver has no registered connection; message dropped
    Offline,
    /// Receiver's outbound queue was full; message dropped
    QueueFull,
    /// Receiver's connection was already gone; entry removed
    Closed,
}

impl RouteOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Delivered => "delivered",
            RouteOutcome::Offline => "offline",
            RouteOutcome::QueueFull => "queue_full",
            RouteOutcome::Closed => "closed",
        }
    }
}

impl std::fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes messages to their receiver's connection.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: ConnectionRegistry,
}

impl MessageRouter {
    /// Create a router over the given registry.
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Deliver one message to its receiver, or drop it.
    ///
    /// The only error this returns is [`RelayError::RegistryClosed`] during
    /// relay shutdown; every per-message condition is an outcome, not an
    /// error, because the sender has already been answered by the time a
    /// message reaches the router.
    #[instrument(skip(self, message), fields(sender = %message.sender_id, receiver = %message.receiver_id))]
    pub async fn route(&self, message: ChatMessage) -> Result<RouteOutcome, RelayError> {
        let Some(connection) = self.registry.lookup(&message.receiver_id).await? else {
            debug!("Receiver not connected, dropping message");
            metrics::record_message_routed(RouteOutcome::Offline.as_str());
            return Ok(RouteOutcome::Offline);
        };

        let receiver_id = message.receiver_id.clone();
        let outcome = match connection.enqueue(message) {
            EnqueueResult::Queued => {
                debug!("Message queued for delivery");
                RouteOutcome::Delivered
            }
            EnqueueResult::QueueFull => {
                warn!(
                    dropped_total = connection.dropped_messages(),
                    "Outbound queue full, message dropped"
                );
                RouteOutcome::QueueFull
            }
            EnqueueResult::Closed => {
                debug!("Outbound queue closed, removing stale registration");
                // Guarded by instance id, so this can never evict a newer
                // connection that registered in the meantime.
                let _ = self.registry.unregister(&receiver_id, connection.id()).await;
                RouteOutcome::Closed
            }
        };
        metrics::record_message_routed(outcome.as_str());
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::connection::ConnectionHandle;
    use crate::types::UserId;

    fn test_message(receiver: &str) -> ChatMessage {
        ChatMessage::new("alice", receiver, "hi")
    }

    #[tokio::test]
    async fn test_route_to_connected_receiver() {
        let registry = ConnectionRegistry::default();
        let router = MessageRouter::new(registry.clone());

        let (connection, mut rx) = ConnectionHandle::new(UserId::from("bob"), 16);
        registry.register(connection).await.unwrap();

        let outcome = router.route(test_message("bob")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Delivered);

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.content, "hi");
        assert_eq!(delivered.sender_id, UserId::from("alice"));
    }

    #[tokio::test]
    async fn test_route_to_offline_receiver() {
        let registry = ConnectionRegistry::default();
        let router = MessageRouter::new(registry.clone());

        let outcome = router.route(test_message("bob")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Offline);

        // Routing to an absent user must not create registry state.
        assert_eq!(registry.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_route_to_full_queue() {
        let registry = ConnectionRegistry::default();
        let router = MessageRouter::new(registry.clone());

        let (connection, _rx) = ConnectionHandle::new(UserId::from("bob"), 1);
        registry.register(connection).await.unwrap();

        let first = router.route(test_message("bob")).await.unwrap();
        assert_eq!(first, RouteOutcome::Delivered);

        // Queue capacity is 1 and nothing is draining it.
        let second = router.route(test_message("bob")).await.unwrap();
        assert_eq!(second, RouteOutcome::QueueFull);

        // The receiver stays registered; only the message was dropped.
        assert!(registry.is_online(&UserId::from("bob")).await.unwrap());
    }

    #[tokio::test]
    async fn test_route_to_closed_queue_removes_entry() {
        let registry = ConnectionRegistry::default();
        let router = MessageRouter::new(registry.clone());

        let (connection, rx) = ConnectionHandle::new(UserId::from("bob"), 16);
        registry.register(connection).await.unwrap();
        drop(rx);

        let outcome = router.route(test_message("bob")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Closed);

        // The stale entry was removed; a later route is a plain miss.
        assert!(!registry.is_online(&UserId::from("bob")).await.unwrap());
        let outcome = router.route(test_message("bob")).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Offline);
    }

    #[tokio::test]
    async fn test_route_after_registry_shutdown() {
        let registry = ConnectionRegistry::new(&RelayConfig::default());
        let router = MessageRouter::new(registry.clone());

        registry.shutdown().await.unwrap();

        let result = router.route(test_message("bob")).await;
        assert!(matches!(result, Err(RelayError::RegistryClosed)));
    }
}
