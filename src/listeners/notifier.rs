//! # Notifier: off-I/O delivery of listener calls and caller completions.
//!
//! Channel actors never call the listener or complete a caller's future
//! themselves. They post a [`Notification`] into their notifier queue and move
//! on; a worker spawned on the [`ObserveScheduler`] drains it. Every channel
//! publisher owns one notifier, so a slow listener call holds up only the
//! outcomes of that channel.
//!
//! ```text
//! ChannelActor 1 ──► [unbounded queue] ──► worker ──► listener.on_*()
//! ChannelActor 2 ──► [unbounded queue] ──► worker      └─► reply.send(outcome)
//! ```
//!
//! ## Rules
//! - **Non-blocking**: posting never awaits.
//! - **Lossless**: the queue is unbounded; completions are never dropped.
//! - **Per-actor FIFO**: notifications from one channel keep their order.
//! - **Listener before caller**: on resolution the listener runs first, then the caller's future completes.
//! - **Isolation**: a panicking listener is logged; the worker keeps running.
//!
//! The worker exits when every [`Notifier`] clone is dropped.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};

use crate::{
    core::{PublishResult, RequestId},
    listeners::{ObserveScheduler, PublishEventListener},
};

pub(crate) enum Notification {
    Published {
        id: RequestId,
        attempt: u32,
    },
    Retry {
        id: RequestId,
        attempt: u32,
        reason: String,
    },
    Resolved {
        id: RequestId,
        result: PublishResult,
        reply: oneshot::Sender<PublishResult>,
    },
}

/// Cloneable handle posting into one notifier worker.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Spawns the worker on `scheduler`.
    pub(crate) fn spawn(
        listener: Arc<dyn PublishEventListener>,
        scheduler: &ObserveScheduler,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Notification>();

        scheduler.spawn(async move {
            while let Some(n) = rx.recv().await {
                deliver(listener.as_ref(), n).await;
            }
        });
        Self { tx }
    }

    pub(crate) fn published(&self, id: RequestId, attempt: u32) {
        let _ = self.tx.send(Notification::Published { id, attempt });
    }

    pub(crate) fn retry(&self, id: RequestId, attempt: u32, reason: impl Into<String>) {
        let _ = self.tx.send(Notification::Retry {
            id,
            attempt,
            reason: reason.into(),
        });
    }

    /// Reports a terminal outcome and completes the caller's future.
    ///
    /// If the worker is gone the caller is still completed, inline.
    pub(crate) fn resolve(
        &self,
        id: RequestId,
        result: PublishResult,
        reply: oneshot::Sender<PublishResult>,
    ) {
        if let Err(mpsc::error::SendError(Notification::Resolved { result, reply, .. })) =
            self.tx.send(Notification::Resolved { id, result, reply })
        {
            let _ = reply.send(result);
        }
    }
}

async fn deliver(listener: &dyn PublishEventListener, n: Notification) {
    match n {
        Notification::Published { id, attempt } => {
            guarded(listener, listener.on_published(id, attempt)).await;
        }
        Notification::Retry {
            id,
            attempt,
            reason,
        } => {
            guarded(listener, listener.on_retry(id, attempt, &reason)).await;
        }
        Notification::Resolved { id, result, reply } => {
            match &result {
                Ok(_) => guarded(listener, listener.on_confirmed(id)).await,
                Err(e) => guarded(listener, listener.on_failed(id, e)).await,
            }
            let _ = reply.send(result);
        }
    }
}

async fn guarded<F>(listener: &dyn PublishEventListener, fut: F)
where
    F: std::future::Future<Output = ()>,
{
    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = panic_err.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        tracing::error!(listener = listener.name(), panic = %info, "publish listener panicked");
    }
}
