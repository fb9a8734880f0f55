//! # Publish event listener trait
//!
//! `PublishEventListener` is the extension point for monitoring publishes. It
//! is driven by the notifier worker of each publisher pool, on the configured
//! [`ObserveScheduler`](crate::ObserveScheduler), never on a channel's I/O path.
//!
//! ## Contract
//! - Every method has a no-op default; implement only what you need.
//! - Calls for one channel arrive in the order the channel resolved them.
//! - A slow listener delays caller completions of its pool, it never blocks channel I/O.
//! - Panics are caught and logged; the caller still receives its outcome.

use async_trait::async_trait;

use crate::{core::RequestId, error::PublishError};

/// Contract for publish observers.
#[async_trait]
pub trait PublishEventListener: Send + Sync + 'static {
    /// A write for `id` was issued (`attempt` starts at 1).
    async fn on_published(&self, _id: RequestId, _attempt: u32) {}

    /// The broker confirmed `id`.
    async fn on_confirmed(&self, _id: RequestId) {}

    /// Attempt `attempt` of `id` was nacked and will be re-published.
    async fn on_retry(&self, _id: RequestId, _attempt: u32, _reason: &str) {}

    /// `id` reached a terminal failure.
    async fn on_failed(&self, _id: RequestId, _error: &PublishError) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Listener that ignores everything. Used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

#[async_trait]
impl PublishEventListener for NoopListener {
    fn name(&self) -> &'static str {
        "noop"
    }
}
