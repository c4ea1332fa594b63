//! Server configuration from environment variables
//!
//! # Environment Variables
//!
//! - `ROOKERY_BIND_ADDR`: Socket address the HTTP server listens on.
//!   Default: `0.0.0.0:3000`
//! - `ROOKERY_DB_PATH`: libSQL database path, `:memory:` for an in-process
//!   database. Default: `:memory:`
//! - `ROOKERY_QUEUE_CAPACITY`: Per-connection outbound queue capacity.
//!   Default: 64

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::info;

use rookery_relay::{RelayConfig, DEFAULT_QUEUE_CAPACITY};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// libSQL database path (`:memory:` for in-process)
    pub db_path: String,
    /// Per-connection outbound queue capacity
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            db_path: ":memory:".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Load server configuration from environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("ROOKERY_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("invalid ROOKERY_BIND_ADDR: {}", addr))?;
        }

        if let Ok(path) = std::env::var("ROOKERY_DB_PATH") {
            config.db_path = path;
        }

        if let Ok(capacity) = std::env::var("ROOKERY_QUEUE_CAPACITY") {
            config.queue_capacity = capacity
                .parse()
                .with_context(|| format!("invalid ROOKERY_QUEUE_CAPACITY: {}", capacity))?;
        }

        Ok(config)
    }

    /// Relay configuration derived from the server settings.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new().with_queue_capacity(self.queue_capacity)
    }

    /// Log the active configuration at startup.
    pub fn log_config(&self) {
        info!("Listening on: {}", self.bind_addr);
        if self.db_path == ":memory:" {
            info!("Message store: in-memory (development mode)");
        } else {
            info!("Message store: {}", self.db_path);
        }
        info!("Outbound queue capacity: {}", self.queue_capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr, SocketAddr::from(([0, 0, 0, 0], 3000)));
        assert_eq!(config.db_path, ":memory:");
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_relay_config_carries_queue_capacity() {
        let config = ServerConfig {
            queue_capacity: 8,
            ..ServerConfig::default()
        };

        assert_eq!(config.relay_config().queue_capacity, 8);
    }

    #[test]
    fn test_relay_config_clamps_zero_capacity() {
        let config = ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        };

        // RelayConfig refuses a zero-capacity queue.
        assert_eq!(config.relay_config().queue_capacity, 1);
    }
}
