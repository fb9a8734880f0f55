//! # Publish requests and their caller-side handle.
//!
//! A [`PublishRequest`] is created at submission and owned by exactly one
//! channel actor until it resolves. The caller keeps a [`PendingPublish`]
//! future that completes with the terminal outcome.
//!
//! ## Ordering guarantees
//! [`RequestId`]s come from a process-wide monotonic counter, so ids are unique
//! across every publisher and increase in submission order.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
};

use tokio::{sync::oneshot, time::Instant};
use tokio_util::time::delay_queue;

use crate::{
    channel::DeliveryTag,
    error::PublishError,
    message::Message,
};

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

/// Terminal outcome of a publish.
pub type PublishResult = Result<Confirmation, PublishError>;

/// Unique identifier assigned to a message at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn next() -> Self {
        Self(REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Successful outcome of a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Request that was confirmed.
    pub request_id: RequestId,
    /// Channel that carried it.
    pub channel: u16,
    /// Attempts used (1 when the first write was confirmed).
    pub attempts: u32,
}

/// Future resolving to the outcome of one publish.
///
/// The request is already queued on its channel when this handle is returned;
/// dropping the handle does not cancel the publish.
#[must_use = "dropping a PendingPublish discards the outcome, the message is still published"]
#[derive(Debug)]
pub struct PendingPublish {
    id: RequestId,
    rx: oneshot::Receiver<PublishResult>,
}

impl PendingPublish {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<PublishResult>) -> Self {
        Self { id, rx }
    }

    /// A handle that resolves immediately with `error`.
    pub(crate) fn rejected(id: RequestId, error: PublishError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { id, rx }
    }

    /// Identifier assigned at submission.
    pub fn request_id(&self) -> RequestId {
        self.id
    }
}

impl Future for PendingPublish {
    type Output = PublishResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PublishError::channel_closed(
                "publisher dropped before resolving the request",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A message in flight on one channel.
pub(crate) struct PublishRequest {
    pub(crate) id: RequestId,
    pub(crate) message: Message,
    pub(crate) submitted_at: Instant,
    /// Writes performed so far.
    pub(crate) attempt: u32,
    pub(crate) reply: oneshot::Sender<PublishResult>,
    pub(crate) tag: Option<DeliveryTag>,
    pub(crate) deadline: Option<delay_queue::Key>,
    pub(crate) retry: Option<delay_queue::Key>,
}

impl PublishRequest {
    pub(crate) fn new(
        id: RequestId,
        message: Message,
        reply: oneshot::Sender<PublishResult>,
    ) -> Self {
        Self {
            id,
            message,
            submitted_at: Instant::now(),
            attempt: 0,
            reply,
            tag: None,
            deadline: None,
            retry: None,
        }
    }
}
