//! Relay configuration.

/// Default capacity of each connection's outbound message queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default buffer size of the registry control channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Configuration for the relay core.
///
/// Both values bound memory per connection and per process; neither loop
/// in the relay ever waits for a full queue to drain.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Capacity of each connection's outbound queue. When the queue is
    /// full, newly routed messages for that connection are dropped and
    /// counted rather than blocking the router.
    pub queue_capacity: usize,
    /// Buffer size of the registry control channel.
    pub command_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-connection outbound queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the registry control channel buffer size.
    pub fn with_command_buffer(mut self, buffer: usize) -> Self {
        self.command_buffer = buffer.max(1);
        self
    }
}
