//! Connection registry: the single source of truth for who is online.
//!
//! All registry state lives inside one control task that owns the map
//! outright; register, unregister and lookup arrive as commands on a
//! channel and are answered over oneshot replies. There is no lock and no
//! second mutation path, so registration, replacement and removal are
//! serialized by construction.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument};

use crate::config::RelayConfig;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::error::RelayError;
use crate::metrics;
use crate::types::UserId;

/// Commands understood by the registry control task.
enum RegistryCommand {
    Register {
        connection: ConnectionHandle,
        reply: oneshot::Sender<()>,
    },
    Unregister {
        user_id: UserId,
        connection_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    Lookup {
        user_id: UserId,
        reply: oneshot::Sender<Option<ConnectionHandle>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the connection registry.
///
/// Cloneable and cheap; every connection session and the router hold one.
/// The registry is constructed explicitly and passed around; there is no
/// process-wide singleton. It lives until [`shutdown`](Self::shutdown) is
/// called or every handle is dropped, at which point the control task
/// closes any surviving connections and exits; commands sent after that
/// fail with [`RelayError::RegistryClosed`].
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    commands: mpsc::Sender<RegistryCommand>,
}

impl ConnectionRegistry {
    /// Create a registry and spawn its control task.
    pub fn new(config: &RelayConfig) -> Self {
        info!("Creating connection registry");
        let (commands, rx) = mpsc::channel(config.command_buffer);
        tokio::spawn(RegistryTask::default().run(rx));
        Self { commands }
    }

    /// Install a connection for its user identity.
    ///
    /// A prior connection registered under the same identity is replaced
    /// and closed by the control task; its pumps observe the cancellation
    /// and tear themselves down, and their late unregister is ignored as
    /// stale.
    #[instrument(skip(self, connection), fields(user_id = %connection.user_id(), connection_id = %connection.id()))]
    pub async fn register(&self, connection: ConnectionHandle) -> Result<(), RelayError> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(RegistryCommand::Register { connection, reply })
            .await
            .map_err(|_| RelayError::RegistryClosed)?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Remove the mapping for `user_id`, but only if the registered
    /// instance is still `connection_id`.
    ///
    /// Returns `true` if the entry was removed. A stale unregister (the
    /// entry now belongs to a newer connection) or an unregister for an
    /// absent identity returns `false`.
    #[instrument(skip(self), fields(user_id = %user_id, connection_id = %connection_id))]
    pub async fn unregister(
        &self,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<bool, RelayError> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(RegistryCommand::Unregister {
                user_id: user_id.clone(),
                connection_id,
                reply,
            })
            .await
            .map_err(|_| RelayError::RegistryClosed)?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Look up the live connection for a user, if any.
    pub async fn lookup(&self, user_id: &UserId) -> Result<Option<ConnectionHandle>, RelayError> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(RegistryCommand::Lookup {
                user_id: user_id.clone(),
                reply,
            })
            .await
            .map_err(|_| RelayError::RegistryClosed)?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Whether a user currently has a registered connection.
    pub async fn is_online(&self, user_id: &UserId) -> Result<bool, RelayError> {
        Ok(self.lookup(user_id).await?.is_some())
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> Result<usize, RelayError> {
        let (reply, ack) = oneshot::channel();
        self.commands
            .send(RegistryCommand::Count { reply })
            .await
            .map_err(|_| RelayError::RegistryClosed)?;
        ack.await.map_err(|_| RelayError::RegistryClosed)
    }

    /// Shut the registry down.
    ///
    /// Closes the control channel, drains commands already in flight, then
    /// closes every connection still registered. Resolves once the map is
    /// empty. Idempotent: a second call observes the closed channel and
    /// returns `Ok(())`.
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        let (reply, ack) = oneshot::channel();
        if self
            .commands
            .send(RegistryCommand::Shutdown { reply })
            .await
            .is_err()
        {
            // Control task already gone; shutdown is complete.
            return Ok(());
        }
        let _ = ack.await;
        Ok(())
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(&RelayConfig::default())
    }
}

/// The control task state: exclusive owner of the connection map.
#[derive(Default)]
struct RegistryTask {
    connections: HashMap<UserId, ConnectionHandle>,
}

impl RegistryTask {
    async fn run(mut self, mut commands: mpsc::Receiver<RegistryCommand>) {
        let mut shutdown_ack: Option<oneshot::Sender<()>> = None;

        while let Some(command) = commands.recv().await {
            match command {
                RegistryCommand::Register { connection, reply } => {
                    self.register(connection);
                    let _ = reply.send(());
                }
                RegistryCommand::Unregister {
                    user_id,
                    connection_id,
                    reply,
                } => {
                    let removed = self.unregister(&user_id, connection_id);
                    let _ = reply.send(removed);
                }
                RegistryCommand::Lookup { user_id, reply } => {
                    let _ = reply.send(self.connections.get(&user_id).cloned());
                }
                RegistryCommand::Count { reply } => {
                    let _ = reply.send(self.connections.len());
                }
                RegistryCommand::Shutdown { reply } => {
                    // Stop accepting commands; the loop keeps running until
                    // everything already buffered has been served.
                    commands.close();
                    shutdown_ack = Some(reply);
                }
            }
        }

        // Channel closed and drained. Close whatever is still registered so
        // the pumps of in-flight connections exit.
        let remaining = self.connections.len();
        for (user_id, connection) in self.connections.drain() {
            debug!(user_id = %user_id, connection_id = %connection.id(), "Closing connection at registry shutdown");
            connection.close();
        }
        metrics::record_connection_count(0);
        if remaining > 0 {
            info!(count = remaining, "Closed remaining connections at registry shutdown");
        }
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
        debug!("Connection registry control task exited");
    }

    fn register(&mut self, connection: ConnectionHandle) {
        let user_id = connection.user_id().clone();
        let connection_id = connection.id();
        if let Some(displaced) = self.connections.insert(user_id.clone(), connection) {
            debug!(
                user_id = %user_id,
                old_connection_id = %displaced.id(),
                new_connection_id = %connection_id,
                "Replaced existing connection registration"
            );
            displaced.close();
        } else {
            debug!(user_id = %user_id, connection_id = %connection_id, "Registered new connection");
        }
        metrics::record_connection_count(self.connections.len() as i64);
    }

    fn unregister(&mut self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        match self.connections.get(user_id) {
            Some(current) if current.id() == connection_id => {
                self.connections.remove(user_id);
                debug!(user_id = %user_id, "Unregistered connection");
                metrics::record_connection_count(self.connections.len() as i64);
                true
            }
            Some(current) => {
                // Out-of-order teardown from a replaced connection; the
                // newer registration stays.
                debug!(
                    user_id = %user_id,
                    current_connection_id = %current.id(),
                    stale_connection_id = %connection_id,
                    "Ignoring stale unregister"
                );
                false
            }
            None => {
                debug!(user_id = %user_id, "Connection was not registered");
                false
            }
        }
    }
}
