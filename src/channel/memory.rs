//! # In-memory broker for tests and local runs.
//!
//! [`MemoryProvider`] hands out [`MemoryChannel`]s that share one simulated
//! broker. The broker records every delivery and answers each write with a
//! scripted [`Reply`]:
//!
//! ```text
//! script:  [Nack, Nack]   default: Ack
//! publish #1 ─► Nack
//! publish #2 ─► Nack
//! publish #3 ─► Ack       (script drained, default applies)
//! ```
//!
//! Replies are global to the broker (not per channel), in write order.
//! `Silent` writes can be settled later with [`MemoryProvider::confirm`] or
//! [`MemoryProvider::reject`], and a channel can be killed with
//! [`MemoryProvider::close_channel`]. `Stall` wedges the writer inside
//! `basic_publish` for good.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    channel::{Channel, ChannelProvider, ChannelRef, ConfirmSink, DeliveryTag},
    error::{ChannelError, ProviderError},
    message::Message,
};

/// Broker answer to one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Confirm the message (only sent in confirm mode).
    Ack,
    /// Reject the message (only sent in confirm mode).
    Nack,
    /// Accept the write, never answer.
    Silent,
    /// Reject the write itself.
    FailWrite,
    /// Never return from the write call.
    Stall,
}

/// A message the broker accepted.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Channel the message was written on.
    pub channel: u16,
    /// Delivery tag assigned by that channel.
    pub tag: DeliveryTag,
    /// The message itself.
    pub message: Message,
}

struct Script {
    queue: VecDeque<Reply>,
    default: Reply,
}

struct Broker {
    next_channel: AtomicU16,
    acquired: AtomicUsize,
    available: AtomicBool,
    refuse_confirms: AtomicBool,
    acquire_limit: Mutex<Option<usize>>,
    script: Mutex<Script>,
    deliveries: Mutex<Vec<Delivery>>,
    channels: Mutex<HashMap<u16, Arc<MemoryChannel>>>,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Broker {
    fn next_reply(&self) -> Reply {
        let mut script = locked(&self.script);
        script.queue.pop_front().unwrap_or(script.default)
    }

    fn channel(&self, number: u16) -> Option<Arc<MemoryChannel>> {
        locked(&self.channels).get(&number).cloned()
    }
}

/// Simulated connection handing out [`MemoryChannel`]s.
///
/// Cloning yields another handle to the same broker.
#[derive(Clone)]
pub struct MemoryProvider {
    broker: Arc<Broker>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Creates a broker that acks everything.
    pub fn new() -> Self {
        Self::with_default_reply(Reply::Ack)
    }

    /// Creates a broker answering every write with `reply` unless scripted otherwise.
    pub fn with_default_reply(reply: Reply) -> Self {
        Self {
            broker: Arc::new(Broker {
                next_channel: AtomicU16::new(1),
                acquired: AtomicUsize::new(0),
                available: AtomicBool::new(true),
                refuse_confirms: AtomicBool::new(false),
                acquire_limit: Mutex::new(None),
                script: Mutex::new(Script {
                    queue: VecDeque::new(),
                    default: reply,
                }),
                deliveries: Mutex::new(Vec::new()),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queues replies consumed by the next writes, in order.
    pub fn script(&self, replies: impl IntoIterator<Item = Reply>) {
        locked(&self.broker.script).queue.extend(replies);
    }

    /// Makes every following acquisition fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.broker.available.store(available, Ordering::SeqCst);
    }

    /// Makes `confirm_select` fail on every channel.
    pub fn refuse_confirm_select(&self, refuse: bool) {
        self.broker.refuse_confirms.store(refuse, Ordering::SeqCst);
    }

    /// Allows `n` more successful acquisitions, then fails.
    pub fn fail_after(&self, n: usize) {
        let acquired = self.acquired();
        *locked(&self.broker.acquire_limit) = Some(acquired + n);
    }

    /// Number of channels handed out so far.
    pub fn acquired(&self) -> usize {
        self.broker.acquired.load(Ordering::SeqCst)
    }

    /// Everything written so far, in write order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        locked(&self.broker.deliveries).clone()
    }

    /// Channel numbers of every write, in write order.
    pub fn delivery_channels(&self) -> Vec<u16> {
        locked(&self.broker.deliveries)
            .iter()
            .map(|d| d.channel)
            .collect()
    }

    /// Numbers of the channels that were closed by their owner.
    pub fn closed_channels(&self) -> Vec<u16> {
        let mut closed: Vec<u16> = locked(&self.broker.channels)
            .values()
            .filter(|c| c.closed.load(Ordering::SeqCst))
            .map(|c| c.number)
            .collect();
        closed.sort_unstable();
        closed
    }

    /// Acks a previously `Silent` delivery.
    pub fn confirm(&self, channel: u16, tag: DeliveryTag) {
        if let Some(sink) = self.broker.channel(channel).and_then(|c| c.sink()) {
            sink.ack(tag, false);
        }
    }

    /// Nacks a previously `Silent` delivery.
    pub fn reject(&self, channel: u16, tag: DeliveryTag) {
        if let Some(sink) = self.broker.channel(channel).and_then(|c| c.sink()) {
            sink.nack(tag, false);
        }
    }

    /// Simulates a transport failure on one channel.
    pub fn close_channel(&self, channel: u16, reason: &str) {
        if let Some(ch) = self.broker.channel(channel) {
            ch.broken.store(true, Ordering::SeqCst);
            if let Some(sink) = ch.sink() {
                sink.closed(reason);
            }
        }
    }
}

#[async_trait]
impl ChannelProvider for MemoryProvider {
    async fn acquire_channel(&self) -> Result<ChannelRef, ProviderError> {
        if !self.broker.available.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable {
                reason: "connection is down".into(),
            });
        }
        if let Some(limit) = *locked(&self.broker.acquire_limit) {
            if self.acquired() >= limit {
                return Err(ProviderError::Unavailable {
                    reason: "channel limit reached".into(),
                });
            }
        }

        let number = self.broker.next_channel.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(MemoryChannel {
            number,
            broker: Arc::clone(&self.broker),
            next_tag: AtomicU64::new(1),
            confirms: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            broken: AtomicBool::new(false),
            sink: Mutex::new(None),
        });
        locked(&self.broker.channels).insert(number, Arc::clone(&channel));
        self.broker.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(channel)
    }
}

/// One simulated channel.
pub struct MemoryChannel {
    number: u16,
    broker: Arc<Broker>,
    next_tag: AtomicU64,
    confirms: AtomicBool,
    closed: AtomicBool,
    broken: AtomicBool,
    sink: Mutex<Option<ConfirmSink>>,
}

impl MemoryChannel {
    fn sink(&self) -> Option<ConfirmSink> {
        locked(&self.sink).clone()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    fn number(&self) -> u16 {
        self.number
    }

    async fn confirm_select(&self) -> Result<(), ChannelError> {
        if self.broker.refuse_confirms.load(Ordering::SeqCst) {
            return Err(ChannelError::Protocol(format!(
                "confirm.select refused on channel {}",
                self.number
            )));
        }
        self.confirms.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn attach(&self, sink: ConfirmSink) {
        *locked(&self.sink) = Some(sink);
    }

    async fn basic_publish(&self, message: &Message) -> Result<DeliveryTag, ChannelError> {
        if self.broken.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed(format!("channel {} is closed", self.number)));
        }

        let reply = self.broker.next_reply();
        match reply {
            Reply::FailWrite => {
                return Err(ChannelError::Write(format!(
                    "write refused on channel {}",
                    self.number
                )));
            }
            Reply::Stall => return std::future::pending().await,
            Reply::Ack | Reply::Nack | Reply::Silent => {}
        }

        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        locked(&self.broker.deliveries).push(Delivery {
            channel: self.number,
            tag,
            message: message.clone(),
        });

        if self.confirms.load(Ordering::SeqCst) {
            if let Some(sink) = self.sink() {
                match reply {
                    Reply::Ack => sink.ack(tag, false),
                    Reply::Nack => sink.nack(tag, false),
                    Reply::Silent | Reply::FailWrite | Reply::Stall => {}
                }
            }
        }
        Ok(tag)
    }

    async fn close(&self) -> Result<(), ChannelError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
