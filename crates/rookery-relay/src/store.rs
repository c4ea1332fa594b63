//! The persistence seam.
//!
//! Message history is an external append-only store. The relay writes to
//! it fire-and-forget, one call per accepted message, and only ever logs
//! failures; delivery is never made contingent on successful storage. The
//! relay defines no read path.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::types::MessageRecord;

/// Append-only message history store provided by the host.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Append one message to the history log.
    async fn persist(&self, record: &MessageRecord) -> Result<(), RelayError>;
}
