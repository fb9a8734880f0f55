//! # Publisher abstraction.
//!
//! [`Publisher`] is implemented by both [`SingleChannelPublisher`](crate::SingleChannelPublisher)
//! and [`RoundRobinPublisher`](crate::RoundRobinPublisher), so a pool can be
//! used wherever one channel could.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    core::request::PendingPublish,
    error::{ChannelError, StopError},
    message::Message,
};

/// Publish endpoint with a start/stop lifecycle.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Submits `message` and returns a future of its terminal outcome.
    ///
    /// Submission happens before this returns: the request id is assigned and
    /// the message is queued on its channel even if the future is never polled.
    fn publish(&self, message: Message) -> PendingPublish;

    /// Prepares the channel(s) and starts accepting messages. Idempotent.
    async fn start(&self) -> Result<(), ChannelError>;

    /// Stops accepting messages, drains in-flight confirms for up to `timeout`,
    /// then force-fails whatever is left.
    async fn stop(&self, timeout: Duration) -> Result<(), StopError>;
}
