//! # SingleChannelPublisher: publishing on one channel.
//!
//! A thin handle in front of a [`ChannelActor`]. The handle assigns request ids
//! and forwards commands; the actor does the work.
//!
//! ## Lifecycle
//! ```text
//! new() ──► Idle ──start()──► Running ──stop(t)──► Stopping ──► Stopped
//!            │                                                  ▲
//!            └──────────────────stop(t) (closes channel)────────┘
//! ```
//!
//! ## Rules
//! - `publish` outside `Running` resolves [`PublishError::NotRunning`] without touching
//!   the channel; the listener still sees the failure.
//! - `stop` returns within the close timeout even if the channel is wedged in a write:
//!   the stop deadline is published to the actor, which abandons the write when it passes.
//! - Only `stop` closes the channel. Dropping a running handle aborts the actor, leaves
//!   the channel open and logs a warning; unresolved callers see `ChannelClosed`.

use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU8, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    channel::{ChannelRef, ConfirmSink},
    config::PublisherSettings,
    core::{
        actor::{ActorParams, ChannelActor, Command},
        publisher::Publisher,
        request::{PendingPublish, PublishRequest, RequestId},
    },
    error::{ChannelError, PublishError, StopError},
    listeners::{Notifier, ObserveScheduler, PublishEventListener},
    message::Message,
};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishes on exactly one channel with confirm tracking, retry and timeout.
///
/// Call [`Publisher::stop`] before dropping a started publisher: the channel is
/// closed only there.
pub struct SingleChannelPublisher {
    channel: ChannelRef,
    confirms: bool,
    notifier: Notifier,
    inbox: mpsc::UnboundedSender<Command>,
    stop_signal: watch::Sender<Option<Instant>>,
    actor: Mutex<Option<ChannelActor>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    in_flight: Arc<AtomicUsize>,
}

impl SingleChannelPublisher {
    /// Creates a publisher over `channel` with its own listener worker.
    ///
    /// Must be called inside a tokio runtime when `scheduler` is
    /// [`ObserveScheduler::current`].
    pub fn new(
        channel: ChannelRef,
        settings: &PublisherSettings,
        listener: Arc<dyn PublishEventListener>,
        scheduler: &ObserveScheduler,
    ) -> Self {
        let notifier = Notifier::spawn(listener, scheduler);
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_signal, stop_rx) = watch::channel(None);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let actor = ChannelActor::new(
            Arc::clone(&channel),
            ActorParams::from(settings),
            notifier.clone(),
            rx,
            stop_rx,
            Arc::clone(&in_flight),
        );

        Self {
            channel,
            confirms: settings.publisher_confirms,
            notifier,
            inbox: tx,
            stop_signal,
            actor: Mutex::new(Some(actor)),
            worker: Mutex::new(None),
            state: AtomicU8::new(IDLE),
            in_flight,
        }
    }

    /// Number of the underlying channel.
    pub fn channel_number(&self) -> u16 {
        self.channel.number()
    }

    /// Requests accepted and not yet resolved (as of the actor's last step).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// True between a successful `start` and the beginning of `stop`.
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Publishes the stop deadline to the actor and queues the stop command.
    fn signal_stop(
        &self,
        timeout: Duration,
        done: oneshot::Sender<Result<(), StopError>>,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        self.stop_signal.send_replace(Some(deadline));
        self.inbox
            .send(Command::Stop {
                timeout,
                deadline,
                done,
            })
            .is_ok()
    }
}

#[async_trait]
impl Publisher for SingleChannelPublisher {
    fn publish(&self, message: Message) -> PendingPublish {
        let id = RequestId::next();
        let (tx, rx) = oneshot::channel();
        if !self.is_running() {
            self.notifier.resolve(id, Err(PublishError::NotRunning), tx);
            return PendingPublish::new(id, rx);
        }

        let request = PublishRequest::new(id, message, tx);
        if let Err(mpsc::error::SendError(Command::Publish(req))) =
            self.inbox.send(Command::Publish(request))
        {
            self.notifier
                .resolve(id, Err(PublishError::NotRunning), req.reply);
        }
        PendingPublish::new(id, rx)
    }

    async fn start(&self) -> Result<(), ChannelError> {
        let Some(actor) = locked(&self.actor).take() else {
            return Ok(());
        };

        if self.confirms {
            if let Err(e) = self.channel.confirm_select().await {
                *locked(&self.actor) = Some(actor);
                return Err(e);
            }
        }
        self.channel.attach(ConfirmSink::new(self.inbox.clone()));

        let handle = tokio::spawn(actor.run());
        *locked(&self.worker) = Some(handle);

        if self
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // stopped while starting
            let (done, _) = oneshot::channel();
            self.signal_stop(Duration::ZERO, done);
        }
        Ok(())
    }

    async fn stop(&self, timeout: Duration) -> Result<(), StopError> {
        match self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => {}
            Err(IDLE) => {
                if self
                    .state
                    .compare_exchange(IDLE, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    drop(locked(&self.actor).take());
                    if let Err(e) = self.channel.close().await {
                        tracing::debug!(channel = self.channel_number(), error = %e, "closing idle channel failed");
                    }
                }
                return Ok(());
            }
            Err(_) => return Ok(()),
        }

        let (done_tx, done_rx) = oneshot::channel();
        let result = if self.signal_stop(timeout, done_tx) {
            // the actor bounds every channel call by the stop deadline
            done_rx.await.unwrap_or(Ok(()))
        } else {
            Ok(())
        };

        let handle = locked(&self.worker).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.state.store(STOPPED, Ordering::SeqCst);
        result
    }
}

impl Drop for SingleChannelPublisher {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = worker.take() {
            let state = *self.state.get_mut();
            if state == RUNNING || state == STOPPING {
                tracing::warn!(
                    channel = self.channel.number(),
                    in_flight = self.in_flight(),
                    "publisher dropped without stop, channel left open"
                );
            }
            handle.abort();
        }
    }
}
