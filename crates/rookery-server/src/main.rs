//! Rookery Server - Real-time chat relay
//!
//! Binary entry point. Wires telemetry, configuration, the message store
//! and the relay core together, then serves HTTP until shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use rookery_server::config::ServerConfig;
use rookery_server::server::{self, RelayState};
use rookery_server::storage::LibSqlMessageStore;
use rookery_server::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init().map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    info!("Rookery Server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("License: AGPL-3.0");

    let config = ServerConfig::from_env()?;
    config.log_config();

    let store = LibSqlMessageStore::open(&config.db_path).await?;
    store.initialize().await?;
    info!("Message store ready");

    let state = Arc::new(RelayState::new(&config, store));
    server::start(state, config.bind_addr).await?;

    info!("Rookery Server stopped");

    Ok(())
}
