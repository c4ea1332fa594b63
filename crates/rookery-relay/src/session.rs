//! Per-connection session: the inbound and outbound pumps.
//!
//! Each live connection runs exactly two loops. The inbound pump reads
//! frames off the transport, persists each message fire-and-forget and
//! hands it to the router. The outbound pump drains the connection's
//! bounded queue onto the transport and emits a close frame when the
//! session ends. Neither loop ever touches another connection's transport.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::RelayConfig;
use crate::connection::ConnectionHandle;
use crate::error::RelayError;
use crate::registry::ConnectionRegistry;
use crate::routing::MessageRouter;
use crate::store::MessageStore;
use crate::transport::{FrameReader, FrameWriter};
use crate::types::{ChatMessage, MessageRecord, UserId};

/// Run one chat session over an upgraded transport.
///
/// This is the transport-upgrade entry point: the caller has already
/// authenticated the user and split its transport into frame halves. The
/// session builds the connection, starts the outbound pump, registers, and
/// then drives the inbound pump until the transport closes, a pump fails,
/// or the connection is closed (disconnect, replacement or relay
/// shutdown). Teardown is idempotent and safe against replacement: a
/// session that was superseded cannot evict its successor's registration.
#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn handle_session<R, W, S>(
    user_id: UserId,
    reader: R,
    writer: W,
    registry: ConnectionRegistry,
    router: MessageRouter,
    store: Arc<S>,
    config: &RelayConfig,
) -> Result<(), RelayError>
where
    R: FrameReader,
    W: FrameWriter,
    S: MessageStore,
{
    let (connection, outbound_rx) = ConnectionHandle::new(user_id.clone(), config.queue_capacity);
    let connection_id = connection.id();
    let shutdown = connection.shutdown_token();

    info!(connection_id = %connection_id, "Chat session starting");

    let writer_task = spawn_outbound_pump(writer, outbound_rx, shutdown.clone());

    if let Err(e) = registry.register(connection.clone()).await {
        // Relay is shutting down; unwind what we started.
        connection.close();
        let _ = writer_task.await;
        return Err(e);
    }

    let session = InboundPump {
        connection: connection.clone(),
        router,
        store,
    };
    session.run(reader).await;

    // Teardown: stop both pumps, then drop the registration. The order
    // matters only in that close() must precede the writer join; the
    // registry guard makes the unregister safe in every interleaving.
    connection.close();
    if let Err(e) = registry.unregister(&user_id, connection_id).await {
        debug!(error = %e, "Registry gone during session teardown");
    }
    let _ = writer_task.await;

    info!(
        connection_id = %connection_id,
        dropped_messages = connection.dropped_messages(),
        "Chat session ended"
    );
    Ok(())
}

/// Inbound half of a session.
struct InboundPump<S: MessageStore> {
    connection: ConnectionHandle,
    router: MessageRouter,
    store: Arc<S>,
}

impl<S: MessageStore> InboundPump<S> {
    /// Read frames until the transport closes, errors, or the session is
    /// cancelled. Each terminal condition ends this pump exactly once.
    async fn run<R: FrameReader>(&self, mut reader: R) {
        let shutdown = self.connection.shutdown_token();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Session closed, inbound pump stopping");
                    break;
                }
                frame = reader.next_frame() => match frame {
                    Ok(Some(message)) => self.handle_message(message).await,
                    Ok(None) => {
                        debug!("Transport closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Transport read failed");
                        break;
                    }
                },
            }
        }
    }

    /// Persist a received message fire-and-forget, then route it.
    async fn handle_message(&self, message: ChatMessage) {
        let record = MessageRecord::new(&message);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.persist(&record).await {
                warn!(message_id = %record.id, error = %e, "Failed to persist message");
            }
        });

        match self.router.route(message).await {
            Ok(outcome) => debug!(outcome = %outcome, "Message routed"),
            Err(e) => debug!(error = %e, "Router unavailable, message dropped"),
        }
    }
}

/// Spawn the outbound pump for a connection.
///
/// Drains the outbound queue onto the transport. Exits when the session
/// is cancelled or the queue closes, sending a close frame if the
/// transport will still take one; a write failure cancels the whole
/// session and exits immediately.
fn spawn_outbound_pump<W: FrameWriter>(
    mut writer: W,
    mut outbound: mpsc::Receiver<ChatMessage>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                maybe_message = outbound.recv() => match maybe_message {
                    Some(message) => {
                        if let Err(e) = writer.write_frame(&message).await {
                            debug!(error = %e, "Transport write failed");
                            shutdown.cancel();
                            return;
                        }
                    }
                    None => break,
                },
            }
        }

        // Queue closed or session cancelled; tell the peer if we still can.
        if let Err(e) = writer.write_close().await {
            debug!(error = %e, "Close frame not delivered");
        }
        debug!("Outbound pump exited");
    })
}
