//! # ChannelActor: the single owner of one channel's publish state.
//!
//! Every [`SingleChannelPublisher`](crate::SingleChannelPublisher) runs one actor
//! task. The actor owns the channel slot (pending-confirm table, backlog and
//! timers) and is the only code that mutates it; everything else talks to it
//! through its inbox.
//!
//! ## Inbox
//! ```text
//! publish()            ──► Command::Publish ──┐
//! ConfirmSink (I/O)    ──► Command::Channel ──┼──► inbox ──► ChannelActor::run()
//! stop()               ──► Command::Stop    ──┘                 │
//!                                         DelayQueue timers ────┘
//!                                         (Deadline / Retry / Close)
//! ```
//!
//! ## Request lifecycle
//! ```text
//! accept ─► [backlog]? ─► write (attempt += 1, on_published)
//!             │
//!             ├─ write error ──────────────► WriteFailure            (terminal)
//!             ├─ confirms off ─────────────► Confirmed               (terminal)
//!             └─ tag registered ─► ack ────► Confirmed               (terminal)
//!                              ├─► nack ─┬─ attempt <= retry_count ─► on_retry ─► sleep(backoff) ─► write
//!                              │         └─ otherwise ──────────────► RetriesExhausted (terminal)
//!                              ├─► deadline ───────────────────────► Timeout       (terminal)
//!                              └─► channel closed / stop deadline ─► ChannelClosed (terminal)
//! ```
//!
//! ## Rules
//! - Each request resolves **exactly once**: `resolve` removes it from every
//!   table and disarms its timers, so a late ack or timer finds nothing.
//! - Retries reuse the same channel (the actor never hands a request away).
//! - The deadline runs from submission and is independent of the retry budget.
//! - A channel write never outlives its request's deadline nor the stop
//!   deadline; the actor abandons the call and moves on.
//! - Outcomes and listener calls go through the [`Notifier`], never inline.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures::StreamExt;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{self, Instant},
};
use tokio_util::time::DelayQueue;

use crate::{
    channel::{ChannelEvent, ChannelRef, DeliveryTag},
    config::PublisherSettings,
    core::request::{Confirmation, PublishRequest, RequestId},
    error::{PublishError, StopError},
    listeners::Notifier,
    policies::BackoffAlgorithm,
};

/// Messages accepted by a channel actor.
pub(crate) enum Command {
    Publish(PublishRequest),
    Channel(ChannelEvent),
    Stop {
        timeout: Duration,
        deadline: Instant,
        done: oneshot::Sender<Result<(), StopError>>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    Deadline(RequestId),
    Retry(RequestId),
    Close,
}

/// Why a channel call was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cutoff {
    Deadline,
    Stop,
}

/// Drives `call` until it completes, the request `deadline` passes or the stop
/// deadline published on `stop` passes, whichever is first.
async fn bounded<T>(
    call: impl Future<Output = T>,
    deadline: Option<Instant>,
    stop: &mut watch::Receiver<Option<Instant>>,
) -> Result<T, Cutoff> {
    tokio::pin!(call);
    let mut watching = true;
    loop {
        let stop_at = *stop.borrow_and_update();
        let limit = match (deadline, stop_at) {
            (Some(d), Some(s)) if s < d => Some((s, Cutoff::Stop)),
            (Some(d), _) => Some((d, Cutoff::Deadline)),
            (None, Some(s)) => Some((s, Cutoff::Stop)),
            (None, None) => None,
        };
        let wake = limit.map(|(at, _)| at).unwrap_or_else(Instant::now);

        tokio::select! {
            biased;
            out = &mut call => return Ok(out),
            _ = time::sleep_until(wake), if limit.is_some() => {
                if let Some((_, cutoff)) = limit {
                    return Err(cutoff);
                }
            }
            changed = stop.changed(), if watching => {
                // sender gone: the stop deadline can no longer move
                if changed.is_err() {
                    watching = false;
                }
            }
        }
    }
}

/// Per-channel view of [`PublisherSettings`].
#[derive(Clone, Debug)]
pub(crate) struct ActorParams {
    pub(crate) confirms: bool,
    pub(crate) retry_count: u32,
    pub(crate) publish_timeout: Option<Duration>,
    pub(crate) backoff: BackoffAlgorithm,
    pub(crate) max_in_flight: Option<usize>,
}

impl From<&PublisherSettings> for ActorParams {
    fn from(s: &PublisherSettings) -> Self {
        Self {
            confirms: s.publisher_confirms,
            retry_count: s.retry_count,
            publish_timeout: s.publish_deadline(),
            backoff: s.backoff.clone(),
            max_in_flight: s.in_flight_limit(),
        }
    }
}

struct Stopping {
    timeout: Duration,
    deadline: Instant,
    forced: usize,
    done: oneshot::Sender<Result<(), StopError>>,
}

pub(crate) struct ChannelActor {
    channel: ChannelRef,
    number: u16,
    params: ActorParams,
    notifier: Notifier,
    inbox: mpsc::UnboundedReceiver<Command>,
    stop_signal: watch::Receiver<Option<Instant>>,
    in_flight: Arc<AtomicUsize>,

    requests: HashMap<RequestId, PublishRequest>,
    unconfirmed: BTreeMap<DeliveryTag, RequestId>,
    backlog: VecDeque<RequestId>,
    timers: DelayQueue<Timer>,

    closed: Option<String>,
    stopping: Option<Stopping>,
}

impl ChannelActor {
    pub(crate) fn new(
        channel: ChannelRef,
        params: ActorParams,
        notifier: Notifier,
        inbox: mpsc::UnboundedReceiver<Command>,
        stop_signal: watch::Receiver<Option<Instant>>,
        in_flight: Arc<AtomicUsize>,
    ) -> Self {
        let number = channel.number();
        Self {
            channel,
            number,
            params,
            notifier,
            inbox,
            stop_signal,
            in_flight,
            requests: HashMap::new(),
            unconfirmed: BTreeMap::new(),
            backlog: VecDeque::new(),
            timers: DelayQueue::new(),
            closed: None,
            stopping: None,
        }
    }

    /// Runs until a stop completes or every inbox sender is gone.
    pub(crate) async fn run(mut self) {
        tracing::debug!(
            channel = self.number,
            confirms = self.params.confirms,
            "channel publisher started"
        );

        loop {
            tokio::select! {
                cmd = self.inbox.recv() => match cmd {
                    Some(cmd) => self.handle(cmd).await,
                    None => {
                        self.fail_all("publisher dropped");
                        break;
                    }
                },
                Some(expired) = self.timers.next(), if !self.timers.is_empty() => {
                    self.on_timer(expired.into_inner()).await;
                }
            }

            self.pump().await;
            self.in_flight.store(self.requests.len(), Ordering::Relaxed);

            if self.stopping.is_some() && self.requests.is_empty() {
                break;
            }
        }

        self.finish().await;
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Publish(req) => self.accept(req).await,
            Command::Channel(ChannelEvent::Ack { tag, multiple }) => {
                for id in self.take_tags(tag, multiple) {
                    self.resolve(id, Ok(()));
                }
            }
            Command::Channel(ChannelEvent::Nack { tag, multiple }) => {
                for id in self.take_tags(tag, multiple) {
                    self.nacked(id);
                }
            }
            Command::Channel(ChannelEvent::Closed { reason }) => self.channel_closed(reason),
            Command::Stop {
                timeout,
                deadline,
                done,
            } => self.begin_stop(timeout, deadline, done),
        }
    }

    async fn accept(&mut self, mut req: PublishRequest) {
        if let Some(reason) = &self.closed {
            let err = PublishError::channel_closed(reason.clone());
            self.notifier.resolve(req.id, Err(err), req.reply);
            return;
        }
        if self.stopping.is_some() {
            self.notifier
                .resolve(req.id, Err(PublishError::NotRunning), req.reply);
            return;
        }

        let id = req.id;
        if let (true, Some(timeout)) = (self.params.confirms, self.params.publish_timeout) {
            let left = timeout.saturating_sub(req.submitted_at.elapsed());
            req.deadline = Some(self.timers.insert(Timer::Deadline(id), left));
        }

        let write_now = self.backlog.is_empty() && self.has_capacity();
        self.requests.insert(id, req);
        if write_now {
            self.write(id).await;
        } else {
            self.backlog.push_back(id);
        }
    }

    /// Writes one attempt of `id` to the channel.
    ///
    /// The call is bounded by the request deadline and by the stop deadline.
    /// Past the stop deadline nothing is written; the request stays put until
    /// the close timer fails it.
    async fn write(&mut self, id: RequestId) {
        if self.past_stop_deadline() {
            return;
        }
        let (message, deadline) = match self.requests.get_mut(&id) {
            Some(req) => {
                req.attempt += 1;
                self.notifier.published(id, req.attempt);
                let deadline = self.params.publish_timeout.map(|t| req.submitted_at + t);
                (req.message.clone(), deadline)
            }
            None => return,
        };

        let call = self.channel.basic_publish(&message);
        let outcome = bounded(call, deadline, &mut self.stop_signal).await;
        match outcome {
            Err(Cutoff::Deadline) => {
                if let Some(timeout) = self.params.publish_timeout {
                    tracing::warn!(channel = self.number, request = %id, ?timeout, "write did not finish before deadline");
                    self.resolve(id, Err(PublishError::Timeout { timeout }));
                }
            }
            Err(Cutoff::Stop) => {
                tracing::debug!(channel = self.number, request = %id, "write abandoned at stop deadline");
            }
            Ok(Ok(tag)) if self.params.confirms => {
                if let Some(req) = self.requests.get_mut(&id) {
                    req.tag = Some(tag);
                    self.unconfirmed.insert(tag, id);
                }
            }
            Ok(Ok(_)) => self.resolve(id, Ok(())),
            Ok(Err(e)) => {
                tracing::warn!(channel = self.number, request = %id, error = %e, "write failed");
                self.resolve(
                    id,
                    Err(PublishError::WriteFailure {
                        error: e.to_string(),
                    }),
                );
            }
        }
    }

    /// Writes backlogged requests while the in-flight window has room.
    async fn pump(&mut self) {
        while self.has_capacity() {
            let Some(id) = self.backlog.pop_front() else {
                break;
            };
            self.write(id).await;
        }
    }

    fn past_stop_deadline(&self) -> bool {
        self.stop_signal
            .borrow()
            .is_some_and(|at| at <= Instant::now())
    }

    fn has_capacity(&self) -> bool {
        match self.params.max_in_flight {
            None => true,
            Some(limit) => self.requests.len() - self.backlog.len() < limit,
        }
    }

    /// Removes and returns the requests addressed by a confirm.
    fn take_tags(&mut self, tag: DeliveryTag, multiple: bool) -> Vec<RequestId> {
        if !multiple {
            return self.unconfirmed.remove(&tag).into_iter().collect();
        }
        let rest = match tag.checked_add(1) {
            Some(next) => self.unconfirmed.split_off(&next),
            None => BTreeMap::new(),
        };
        std::mem::replace(&mut self.unconfirmed, rest)
            .into_values()
            .collect()
    }

    fn nacked(&mut self, id: RequestId) {
        let Some(req) = self.requests.get_mut(&id) else {
            return;
        };
        req.tag = None;
        let attempt = req.attempt;

        if attempt <= self.params.retry_count {
            let delay = self.params.backoff.delay(attempt);
            req.retry = Some(self.timers.insert(Timer::Retry(id), delay));
            tracing::debug!(channel = self.number, request = %id, attempt, ?delay, "nacked, retry scheduled");
            self.notifier.retry(id, attempt, "nacked by broker");
        } else {
            self.resolve(id, Err(PublishError::RetriesExhausted { attempts: attempt }));
        }
    }

    fn channel_closed(&mut self, reason: String) {
        if self.closed.is_some() {
            return;
        }
        tracing::warn!(
            channel = self.number,
            reason = %reason,
            pending = self.requests.len(),
            "channel closed, failing pending requests"
        );
        self.fail_all(&reason);
        self.closed = Some(reason);
    }

    fn begin_stop(
        &mut self,
        timeout: Duration,
        deadline: Instant,
        done: oneshot::Sender<Result<(), StopError>>,
    ) {
        if self.stopping.is_some() {
            let _ = done.send(Ok(()));
            return;
        }
        tracing::debug!(
            channel = self.number,
            pending = self.requests.len(),
            ?timeout,
            "stopping channel publisher"
        );
        self.timers.insert_at(Timer::Close, deadline);
        self.stopping = Some(Stopping {
            timeout,
            deadline,
            forced: 0,
            done,
        });
    }

    async fn on_timer(&mut self, timer: Timer) {
        match timer {
            Timer::Deadline(id) => {
                let Some(req) = self.requests.get_mut(&id) else {
                    return;
                };
                req.deadline = None;
                if let Some(timeout) = self.params.publish_timeout {
                    tracing::warn!(channel = self.number, request = %id, ?timeout, "no confirm before deadline");
                    self.resolve(id, Err(PublishError::Timeout { timeout }));
                }
            }
            Timer::Retry(id) => {
                let Some(req) = self.requests.get_mut(&id) else {
                    return;
                };
                req.retry = None;
                self.write(id).await;
            }
            Timer::Close => {
                let forced = self.fail_all("publisher stopped before confirm");
                if forced > 0 {
                    tracing::warn!(channel = self.number, forced, "close timeout elapsed, force-failed requests");
                }
                if let Some(stopping) = self.stopping.as_mut() {
                    stopping.forced = forced;
                }
            }
        }
    }

    /// Fails every request the actor holds, in submission order.
    fn fail_all(&mut self, reason: &str) -> usize {
        let mut ids: Vec<RequestId> = self.requests.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            self.resolve(*id, Err(PublishError::channel_closed(reason)));
        }
        ids.len()
    }

    /// Terminal resolution of `id`; a no-op if it already resolved.
    fn resolve(&mut self, id: RequestId, outcome: Result<(), PublishError>) {
        let Some(mut req) = self.requests.remove(&id) else {
            return;
        };
        if let Some(key) = req.deadline.take() {
            self.timers.remove(&key);
        }
        if let Some(key) = req.retry.take() {
            self.timers.remove(&key);
        }
        if let Some(tag) = req.tag.take() {
            self.unconfirmed.remove(&tag);
        }
        if let Some(pos) = self.backlog.iter().position(|queued| *queued == id) {
            self.backlog.remove(pos);
        }

        let result = outcome.map(|()| Confirmation {
            request_id: id,
            channel: self.number,
            attempts: req.attempt,
        });
        self.notifier.resolve(id, result, req.reply);
    }

    async fn finish(mut self) {
        self.in_flight.store(0, Ordering::Relaxed);

        let Some(stopping) = self.stopping.take() else {
            if let Err(e) = self.channel.close().await {
                tracing::debug!(channel = self.number, error = %e, "channel close failed");
            }
            return;
        };

        if self.closed.is_none() {
            match time::timeout_at(stopping.deadline, self.channel.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(channel = self.number, error = %e, "channel close failed");
                }
                Err(_) => {
                    tracing::warn!(channel = self.number, "channel close did not finish within close timeout");
                }
            }
        }

        tracing::debug!(channel = self.number, "channel publisher stopped");
        let result = match stopping.forced {
            0 => Ok(()),
            unresolved => Err(StopError::CloseTimeout {
                timeout: stopping.timeout,
                unresolved,
            }),
        };
        let _ = stopping.done.send(result);
    }
}
