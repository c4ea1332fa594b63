//! WebSocket chat endpoint
//!
//! Upgrades the HTTP connection and runs a relay session over it. One
//! text frame carries one JSON-encoded chat message; everything past the
//! upgrade is the relay core's business.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use rookery_relay::{handle_session, ChatMessage, FrameReader, FrameWriter, RelayError, UserId};

use crate::server::RelayState;

/// Header carrying the caller's verified identity.
///
/// Authentication happens in front of this service; the fronting layer
/// strips any client-supplied value and injects the identity it verified.
pub const USER_ID_HEADER: &str = "x-rookery-user-id";

/// Create the chat WebSocket router.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws/chat", get(chat_ws_handler))
        .with_state(state)
}

/// Identity taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or((StatusCode::UNAUTHORIZED, "missing user identity"))?;

        Ok(AuthenticatedUser(UserId::from(user_id)))
    }
}

/// WebSocket upgrade handler for `/ws/chat`.
///
/// The identity extractor runs before the upgrade, so requests without an
/// identity are rejected with 401 while still plain HTTP.
async fn chat_ws_handler(
    user: AuthenticatedUser,
    ws: WebSocketUpgrade,
    State(state): State<Arc<RelayState>>,
) -> Response {
    info!(user_id = %user.0, "Chat WebSocket connection request");
    ws.on_upgrade(move |socket| handle_chat_socket(socket, user.0, state))
}

/// Run a relay session over an upgraded socket.
async fn handle_chat_socket(socket: WebSocket, user_id: UserId, state: Arc<RelayState>) {
    let (sink, stream) = socket.split();
    let reader = WsFrameReader { stream };
    let writer = WsFrameWriter { sink };

    if let Err(e) = handle_session(
        user_id.clone(),
        reader,
        writer,
        state.registry.clone(),
        state.router.clone(),
        Arc::clone(&state.store),
        &state.relay_config,
    )
    .await
    {
        warn!(user_id = %user_id, "Chat session failed: {}", e);
    }
}

/// The reading half of the socket as a relay frame source.
struct WsFrameReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn next_frame(&mut self) -> Result<Option<ChatMessage>, RelayError> {
        while let Some(message) = self.stream.next().await {
            match message {
                // An undecodable frame is an error and ends the session.
                Ok(Message::Text(text)) => return ChatMessage::from_json(&text).map(Some),
                Ok(Message::Binary(_)) => {
                    warn!("Binary frames are not supported, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Keepalive; answered by the framework.
                }
                Ok(Message::Close(_)) => {
                    debug!("Close frame received");
                    return Ok(None);
                }
                Err(e) => return Err(RelayError::transport(e.to_string())),
            }
        }

        Ok(None)
    }
}

/// The writing half of the socket as a relay frame sink.
struct WsFrameWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_frame(&mut self, message: &ChatMessage) -> Result<(), RelayError> {
        let frame = message.to_json()?;
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| RelayError::transport(e.to_string()))
    }

    async fn write_close(&mut self) -> Result<(), RelayError> {
        self.sink
            .send(Message::Close(None))
            .await
            .map_err(|e| RelayError::transport(e.to_string()))
    }
}
