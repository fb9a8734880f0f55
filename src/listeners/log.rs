//! # LogListener: publish events as `tracing` records
//!
//! ## Example output (fmt subscriber)
//! ```text
//! DEBUG chanpool::listeners::log: published request=req-7 attempt=1
//!  WARN chanpool::listeners::log: retrying request=req-7 attempt=1 reason="nacked by broker"
//! DEBUG chanpool::listeners::log: published request=req-7 attempt=2
//! DEBUG chanpool::listeners::log: confirmed request=req-7
//! ERROR chanpool::listeners::log: failed request=req-9 error=no confirm within 5s label="publish_timeout"
//! ```

use async_trait::async_trait;

use crate::{core::RequestId, error::PublishError, listeners::PublishEventListener};

/// Listener writing every callback to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl LogListener {
    /// Construct a new [`LogListener`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublishEventListener for LogListener {
    async fn on_published(&self, id: RequestId, attempt: u32) {
        tracing::debug!(request = %id, attempt, "published");
    }

    async fn on_confirmed(&self, id: RequestId) {
        tracing::debug!(request = %id, "confirmed");
    }

    async fn on_retry(&self, id: RequestId, attempt: u32, reason: &str) {
        tracing::warn!(request = %id, attempt, reason, "retrying");
    }

    async fn on_failed(&self, id: RequestId, error: &PublishError) {
        tracing::error!(request = %id, error = %error, label = error.as_label(), "failed");
    }

    fn name(&self) -> &'static str {
        "LogListener"
    }
}
