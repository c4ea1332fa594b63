//! Relay metrics for observability.
//!
//! Uses the global OpenTelemetry meter provider, which must be initialized
//! by the host application. Without a provider installed these are no-ops.

use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

static METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    METER.get_or_init(|| opentelemetry::global::meter("rookery-relay"))
}

/// Counter for messages handled by the router.
pub fn messages_routed() -> Counter<u64> {
    meter()
        .u64_counter("relay.messages.routed")
        .with_description("Total messages handled by the router")
        .with_unit("message")
        .build()
}

/// Gauge for registered connections.
pub fn connections_active() -> Gauge<i64> {
    meter()
        .i64_gauge("relay.connections.active")
        .with_description("Current number of registered connections")
        .with_unit("connection")
        .build()
}

/// Record a message passing through the router with its outcome.
pub fn record_message_routed(outcome: &str) {
    messages_routed().add(1, &[KeyValue::new("outcome", outcome.to_string())]);
}

/// Record the registered connection count.
pub fn record_connection_count(count: i64) {
    connections_active().record(count, &[]);
}
