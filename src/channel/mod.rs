//! # Broker channel abstraction.
//!
//! The publishers never speak the wire protocol themselves. They consume two
//! narrow traits:
//!
//! - [`ChannelProvider`] hands out fresh channels over a shared connection;
//! - [`Channel`] writes messages, and reports broker confirms and channel
//!   closure **asynchronously** through the [`ConfirmSink`] attached to it.
//!
//! ## Confirm flow
//! ```text
//! ChannelActor ── basic_publish(&msg) ──► Channel ──► broker
//!      ▲                  │
//!      │             DeliveryTag
//!      │
//!      └── inbox ◄── ConfirmSink::{ack, nack, closed} ◄── channel I/O callback
//! ```
//!
//! ## Rules
//! - `basic_publish` returns the delivery tag the broker will use in its confirm.
//! - Tags are strictly increasing per channel, starting at 1.
//! - [`ConfirmSink`] calls never block; they only post into the actor's inbox.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    core::Command,
    error::{ChannelError, ProviderError},
    message::Message,
};

/// Per-channel publish sequence number used by broker confirms.
pub type DeliveryTag = u64;

/// Shared handle to a channel.
pub type ChannelRef = Arc<dyn Channel>;

/// Broker-side notification about a published message or the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChannelEvent {
    Ack { tag: DeliveryTag, multiple: bool },
    Nack { tag: DeliveryTag, multiple: bool },
    Closed { reason: String },
}

/// Callback target handed to a [`Channel`] by its publisher.
///
/// Implementations call it from their I/O path. Each call posts one event into
/// the owning publisher's inbox and returns immediately. Events sent after the
/// publisher stopped are discarded.
#[derive(Clone, Debug)]
pub struct ConfirmSink {
    inbox: mpsc::UnboundedSender<Command>,
}

impl ConfirmSink {
    pub(crate) fn new(inbox: mpsc::UnboundedSender<Command>) -> Self {
        Self { inbox }
    }

    /// The broker confirmed `tag` (and every earlier tag when `multiple`).
    pub fn ack(&self, tag: DeliveryTag, multiple: bool) {
        self.post(ChannelEvent::Ack { tag, multiple });
    }

    /// The broker rejected `tag` (and every earlier tag when `multiple`).
    pub fn nack(&self, tag: DeliveryTag, multiple: bool) {
        self.post(ChannelEvent::Nack { tag, multiple });
    }

    /// The channel or its connection closed.
    pub fn closed(&self, reason: impl Into<String>) {
        self.post(ChannelEvent::Closed {
            reason: reason.into(),
        });
    }

    /// True once the owning publisher has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    fn post(&self, event: ChannelEvent) {
        let _ = self.inbox.send(Command::Channel(event));
    }
}

/// # One multiplexed broker session.
///
/// A channel is owned by exactly one
/// [`SingleChannelPublisher`](crate::SingleChannelPublisher) for its lifetime.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Channel number on the connection (for logs and routing diagnostics).
    fn number(&self) -> u16;

    /// Switches the channel into publisher-confirm mode.
    async fn confirm_select(&self) -> Result<(), ChannelError>;

    /// Registers the sink receiving confirms and closure notifications.
    fn attach(&self, sink: ConfirmSink);

    /// Writes one message and returns its delivery tag.
    async fn basic_publish(&self, message: &Message) -> Result<DeliveryTag, ChannelError>;

    /// Closes the channel.
    async fn close(&self) -> Result<(), ChannelError>;
}

/// # Source of channels over one physical connection.
///
/// Channels are not pooled or reused by the provider: every call yields a new one.
#[async_trait]
pub trait ChannelProvider: Send + Sync + 'static {
    /// Opens a new channel.
    ///
    /// Fails with [`ProviderError::Unavailable`] if the connection cannot produce one.
    async fn acquire_channel(&self) -> Result<ChannelRef, ProviderError>;
}

