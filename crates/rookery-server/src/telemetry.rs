//! Telemetry initialization for Rookery Server
//!
//! Provides structured logging via tracing-subscriber. Log filtering is
//! controlled through the standard `RUST_LOG` environment variable with a
//! development-friendly default. OTLP export is not wired up yet; the
//! `opentelemetry` propagation types used by the relay core keep the door
//! open for it.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing and logging for the server.
///
/// Must be called once, before any spans or events are emitted.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rookery_server=debug,rookery_relay=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Telemetry initialized");

    Ok(())
}
