//! Per-connection handle: outbound queue, shutdown signal, instance identity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::{ChatMessage, UserId};

/// Unique identity of one registration instance.
///
/// A user who reconnects gets a new `ConnectionId`; the registry compares
/// these on unregister so a superseded connection's late teardown can
/// never evict its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of attempting to enqueue a message for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Message was placed on the outbound queue
    Queued,
    /// The outbound queue is full; the message was dropped and counted
    QueueFull,
    /// The outbound queue is closed; the connection is gone
    Closed,
}

/// Cheap, cloneable handle to one live connection.
///
/// The handle is what the registry stores and what the router enqueues
/// through. The connection's pumps own everything else: the transport and
/// the receiving side of the outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    outbound: mpsc::Sender<ChatMessage>,
    shutdown: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl ConnectionHandle {
    /// Create a handle together with the receiving side of its outbound
    /// queue. The caller (the session entry point) hands the receiver to
    /// the outbound pump.
    pub fn new(user_id: UserId, queue_capacity: usize) -> (Self, mpsc::Receiver<ChatMessage>) {
        let (outbound, rx) = mpsc::channel(queue_capacity);
        let handle = Self {
            id: ConnectionId::generate(),
            user_id,
            outbound,
            shutdown: CancellationToken::new(),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (handle, rx)
    }

    /// The instance identity of this registration.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The user this connection belongs to.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Token cancelled when the connection is closed. The pumps select on
    /// this to terminate.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Attempt to place a message on the outbound queue without blocking.
    ///
    /// A full queue drops the new message and increments the dropped
    /// counter; the caller receives the outcome but no error.
    pub fn enqueue(&self, message: ChatMessage) -> EnqueueResult {
        match self.outbound.try_send(message) {
            Ok(()) => EnqueueResult::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                EnqueueResult::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueResult::Closed,
        }
    }

    /// Signal both pumps to terminate and release the transport.
    ///
    /// Safe to call any number of times, from either pump, the registry,
    /// or the host.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Messages dropped against this connection because its queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
