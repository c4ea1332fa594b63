//! Axum HTTP server hosting the chat relay
//!
//! Wires the relay core (registry, router, store) into an HTTP surface:
//! the WebSocket chat endpoint plus a health probe. Serving and graceful
//! shutdown live here; per-route logic lives under `routes`.

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use rookery_relay::{ConnectionRegistry, MessageRouter, RelayConfig};

use crate::config::ServerConfig;
use crate::storage::LibSqlMessageStore;

mod routes;

pub use routes::chat::USER_ID_HEADER;

/// Server application state shared by every route
pub struct RelayState {
    /// Live connection registry
    pub registry: ConnectionRegistry,
    /// Message router delivering between connections
    pub router: MessageRouter,
    /// Append-only message log
    pub store: Arc<LibSqlMessageStore>,
    /// Relay tuning handed to each session
    pub relay_config: RelayConfig,
}

impl RelayState {
    /// Build the relay core from server configuration
    pub fn new(config: &ServerConfig, store: LibSqlMessageStore) -> Self {
        let relay_config = config.relay_config();
        let registry = ConnectionRegistry::new(&relay_config);
        let router = MessageRouter::new(registry.clone());

        Self {
            registry,
            router,
            store: Arc::new(store),
            relay_config,
        }
    }
}

/// Start the HTTP server and serve until shutdown
///
/// Serves plain HTTP; TLS termination belongs to the deployment in front.
/// On shutdown the listener drains first, then the registry closes every
/// remaining chat session.
pub async fn start(state: Arc<RelayState>, addr: SocketAddr) -> Result<()> {
    let app = create_router(state.clone());

    info!("Starting Axum HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.registry.shutdown().await?;
    info!("Relay shut down");

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, draining connections");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, draining connections");
        }
    }
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: Arc<RelayState>) -> Router {
    // Chat router applies its own state before merging, converting
    // Router<Arc<RelayState>> to Router<()>
    let chat_router = routes::chat::router(state.clone());

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(chat_router)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive()) // TODO: Configure proper CORS in production
}

/// Response for the health check endpoint
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    license: String,
    /// Number of live chat connections
    connections: usize,
    /// Message store status
    storage: String,
}

/// Health check endpoint (for load balancers)
async fn health_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    // A closed registry means the server is already draining.
    let connections = state.registry.connection_count().await.unwrap_or(0);

    match state.store.health_check().await {
        Ok(true) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                service: "rookery-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                license: "AGPL-3.0".to_string(),
                connections,
                storage: "healthy".to_string(),
            }),
        ),
        Ok(false) => {
            warn!("Health check: message store unhealthy");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    service: "rookery-server".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    license: "AGPL-3.0".to_string(),
                    connections,
                    storage: "unhealthy".to_string(),
                }),
            )
        }
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    service: "rookery-server".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    license: "AGPL-3.0".to_string(),
                    connections,
                    storage: format!("storage error: {}", e),
                }),
            )
        }
    }
}
