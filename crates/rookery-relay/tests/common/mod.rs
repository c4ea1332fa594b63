//! Test utilities for relay integration testing.
//!
//! Provides channel-backed transport fakes, message store fakes, and a
//! client handle for driving sessions from the outside.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use rookery_relay::{
    handle_session, ChatMessage, ConnectionRegistry, FrameReader, FrameWriter, MessageRecord,
    MessageRouter, MessageStore, RelayConfig, RelayError, UserId,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Something the fake transport wrote towards the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A message frame delivered to the client
    Frame(ChatMessage),
    /// The close notification sent during session teardown
    Closed,
}

/// Receiving half of the fake transport, handed to the inbound pump.
pub struct TestFrameReader {
    frames: mpsc::Receiver<Result<ChatMessage, RelayError>>,
}

#[async_trait]
impl FrameReader for TestFrameReader {
    async fn next_frame(&mut self) -> Result<Option<ChatMessage>, RelayError> {
        match self.frames.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(e),
            // Client handle dropped its sender: the peer went away.
            None => Ok(None),
        }
    }
}

/// Sending half of the fake transport, handed to the outbound pump.
///
/// The event channel is bounded so tests can simulate a client that stops
/// consuming: once the buffer is full, `write_frame` blocks like a real
/// transport with a stalled peer.
pub struct TestFrameWriter {
    events: mpsc::Sender<ClientEvent>,
}

#[async_trait]
impl FrameWriter for TestFrameWriter {
    async fn write_frame(&mut self, message: &ChatMessage) -> Result<(), RelayError> {
        self.events
            .send(ClientEvent::Frame(message.clone()))
            .await
            .map_err(|_| RelayError::transport("test client hung up"))
    }

    async fn write_close(&mut self) -> Result<(), RelayError> {
        self.events
            .send(ClientEvent::Closed)
            .await
            .map_err(|_| RelayError::transport("test client hung up"))
    }
}

/// Client-side handle to a fake transport.
pub struct TestClient {
    frames: Option<mpsc::Sender<Result<ChatMessage, RelayError>>>,
    events: mpsc::Receiver<ClientEvent>,
}

impl TestClient {
    /// Send a frame into the session, as if the peer had written it.
    pub async fn send(&mut self, message: ChatMessage) {
        self.frames
            .as_ref()
            .expect("client already disconnected")
            .send(Ok(message))
            .await
            .expect("session is no longer reading");
    }

    /// Inject a transport read failure.
    pub async fn fail(&mut self, error: RelayError) {
        self.frames
            .as_ref()
            .expect("client already disconnected")
            .send(Err(error))
            .await
            .expect("session is no longer reading");
    }

    /// Close the connection from the client side (clean disconnect).
    pub fn disconnect(&mut self) {
        self.frames.take();
    }

    /// Wait for the next event written towards this client.
    pub async fn next_event(&mut self) -> ClientEvent {
        timeout(DEFAULT_TIMEOUT, self.events.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("transport writer gone without close event")
    }

    /// Wait for the next message frame, failing on anything else.
    pub async fn expect_frame(&mut self) -> ChatMessage {
        match self.next_event().await {
            ClientEvent::Frame(message) => message,
            other => panic!("expected a message frame, got {:?}", other),
        }
    }

    /// Wait for the close notification, failing on anything else.
    pub async fn expect_close(&mut self) {
        match self.next_event().await {
            ClientEvent::Closed => {}
            other => panic!("expected the close notification, got {:?}", other),
        }
    }

    /// Assert that nothing has been written towards this client.
    pub fn assert_no_events(&mut self) {
        if let Ok(event) = self.events.try_recv() {
            panic!("expected no client events, got {:?}", event);
        }
    }
}

/// Build a connected pair of fake transport halves and the client handle.
pub fn test_transport(writer_capacity: usize) -> (TestFrameReader, TestFrameWriter, TestClient) {
    let (frame_tx, frame_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(writer_capacity);
    (
        TestFrameReader { frames: frame_rx },
        TestFrameWriter { events: event_tx },
        TestClient {
            frames: Some(frame_tx),
            events: event_rx,
        },
    )
}

/// Message store fake that records everything it is given.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<MessageRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().await.clone()
    }

    /// Wait until at least `count` records have been persisted.
    pub async fn wait_for_records(&self, count: usize) -> Vec<MessageRecord> {
        timeout(DEFAULT_TIMEOUT, async {
            loop {
                let records = self.records.lock().await;
                if records.len() >= count {
                    return records.clone();
                }
                drop(records);
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for persisted records")
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn persist(&self, record: &MessageRecord) -> Result<(), RelayError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

/// Message store fake whose writes always fail.
#[derive(Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageStore for FailingStore {
    async fn persist(&self, _record: &MessageRecord) -> Result<(), RelayError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        Err(RelayError::storage("disk on fire"))
    }
}

/// Everything a session test needs, wired to one registry.
pub struct TestRelay<S> {
    pub registry: ConnectionRegistry,
    pub router: MessageRouter,
    pub store: Arc<S>,
    pub config: RelayConfig,
}

impl<S: MessageStore> TestRelay<S> {
    pub fn with_store(store: S, config: RelayConfig) -> Self {
        let registry = ConnectionRegistry::new(&config);
        let router = MessageRouter::new(registry.clone());
        Self {
            registry,
            router,
            store: Arc::new(store),
            config,
        }
    }

    /// Start a session for `user` over a fresh fake transport.
    ///
    /// Returns the client handle and the session's join handle. The
    /// session is not registered yet when this returns; use
    /// [`wait_until_online`] before routing at it.
    pub fn spawn_session(&self, user: &str, writer_capacity: usize) -> SpawnedSession {
        let (reader, writer, client) = test_transport(writer_capacity);
        let user_id = UserId::from(user);
        let registry = self.registry.clone();
        let router = self.router.clone();
        let store = Arc::clone(&self.store);
        let config = self.config.clone();
        let session = tokio::spawn(async move {
            handle_session(user_id, reader, writer, registry, router, store, &config).await
        });
        SpawnedSession { client, session }
    }
}

impl TestRelay<InMemoryStore> {
    pub fn new() -> Self {
        Self::with_store(InMemoryStore::new(), RelayConfig::default())
    }
}

/// A running session under test.
pub struct SpawnedSession {
    pub client: TestClient,
    pub session: JoinHandle<Result<(), RelayError>>,
}

impl SpawnedSession {
    /// Wait for the session task to finish and return its result.
    pub async fn join(self) -> Result<(), RelayError> {
        timeout(DEFAULT_TIMEOUT, self.session)
            .await
            .expect("timed out waiting for session to end")
            .expect("session task panicked")
    }
}

/// Poll the registry until `user` is online.
pub async fn wait_until_online(registry: &ConnectionRegistry, user: &str) {
    let user_id = UserId::from(user);
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            if registry.is_online(&user_id).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for user to come online");
}

/// Poll the registry until `user` is offline.
pub async fn wait_until_offline(registry: &ConnectionRegistry, user: &str) {
    let user_id = UserId::from(user);
    timeout(DEFAULT_TIMEOUT, async {
        loop {
            if !registry.is_online(&user_id).await.unwrap_or(false) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for user to go offline");
}
