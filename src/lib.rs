//! # chanpool
//!
//! **chanpool** publishes messages to an AMQP-style broker over a pool of
//! channels, with publisher confirms, bounded retries and per-message timeouts.
//!
//! Every submitted message ends in exactly one terminal outcome: confirmed by
//! the broker, or failed with a [`PublishError`]. Callers get that outcome from
//! the [`PendingPublish`] future, and a [`PublishEventListener`] sees every
//! step along the way.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                         ┌──────────────────────────────┐
//!      publish(msg) ────► │      RoundRobinPublisher     │
//!                         │  AtomicUsize cursor, i mod N │
//!                         └──────┬─────────┬─────────┬───┘
//!                                ▼         ▼         ▼
//!                     ┌────────────┐ ┌────────────┐ ┌────────────┐
//!                     │ SingleCh.  │ │ SingleCh.  │ │ SingleCh.  │
//!                     │ Publisher  │ │ Publisher  │ │ Publisher  │
//!                     └─────┬──────┘ └─────┬──────┘ └─────┬──────┘
//!                           ▼ inbox        ▼ inbox        ▼ inbox
//!                     ┌────────────┐ ┌────────────┐ ┌────────────┐
//!                     │ChannelActor│ │ChannelActor│ │ChannelActor│
//!                     │ pending    │ │ pending    │ │ pending    │
//!                     │ backlog    │ │ backlog    │ │ backlog    │
//!                     │ timers     │ │ timers     │ │ timers     │
//!                     └──┬──────▲──┘ └──┬──────▲──┘ └──┬──────▲──┘
//!           basic_publish│      │ConfirmSink (ack / nack / closed)
//!                        ▼      │       ▼      │       ▼      │
//!                     ┌──────────────────────────────────────────┐
//!                     │       Channel (one per publisher)        │
//!                     └──────────────────────────────────────────┘
//!
//!   ChannelActor ──► its Notifier queue ──► worker (on ObserveScheduler)
//!                                          ├─► listener.on_*()
//!                                          └─► PendingPublish resolves
//! ```
//!
//! ### Request lifecycle
//! ```text
//! publish ─► write (attempt 1) ─┬─ ack ───────────────────────► Ok(Confirmation)
//!                               ├─ nack, attempt <= retry_count ─► backoff ─► write (attempt + 1)
//!                               ├─ nack, budget spent ────────► RetriesExhausted
//!                               ├─ write error ───────────────► WriteFailure
//!                               ├─ publish_timeout elapsed ───► Timeout
//!                               └─ channel closed / stop ─────► ChannelClosed
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                                 |
//! |-------------------|--------------------------------------------------------------|----------------------------------------------------|
//! | **Publishing**    | Confirm-tracking publishers and the round-robin pool.        | [`Publisher`], [`RoundRobinPublisher`]             |
//! | **Factory**       | Builds independent pools from shared settings.               | [`PublisherFactory`], [`PublisherFactoryBuilder`]  |
//! | **Channels**      | Narrow seam to the broker client.                            | [`Channel`], [`ChannelProvider`], [`ConfirmSink`]  |
//! | **Policies**      | Retry delay strategies.                                      | [`BackoffAlgorithm`], [`JitterPolicy`]             |
//! | **Observation**   | Hooks for logging and metrics, run off the I/O path.         | [`PublishEventListener`], [`ObserveScheduler`]     |
//! | **Errors**        | Typed terminal outcomes and lifecycle errors.                | [`PublishError`], [`FactoryError`], [`StopError`]  |
//! | **Configuration** | One immutable settings struct per factory.                   | [`PublisherSettings`]                              |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogListener`], a listener writing to `tracing`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use chanpool::{
//!     channel::memory::MemoryProvider, BackoffAlgorithm, Message, Publisher, PublisherFactory,
//!     PublisherSettings,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = PublisherSettings {
//!         num_channels: 3,
//!         retry_count: 2,
//!         backoff: BackoffAlgorithm::fixed(Duration::from_millis(100)),
//!         ..PublisherSettings::default()
//!     };
//!
//!     // Any ChannelProvider works; the in-memory broker acks everything.
//!     let pool = PublisherFactory::builder(MemoryProvider::new(), settings)
//!         // .with_listener(Arc::new(chanpool::LogListener::new()))
//!         .build()
//!         .create_publisher()
//!         .await?;
//!
//!     let confirmation = pool
//!         .publish(Message::new("orders", "order.created", r#"{"id":1}"#))
//!         .await?;
//!     assert_eq!(confirmation.attempts, 1);
//!
//!     pool.stop(Duration::from_secs(1)).await?;
//!     Ok(())
//! }
//! ```
pub mod channel;
mod config;
mod core;
mod error;
mod listeners;
mod message;
mod policies;

// ---- Public re-exports ----

pub use channel::{Channel, ChannelProvider, ChannelRef, ConfirmSink, DeliveryTag};
pub use config::PublisherSettings;
pub use core::{
    Confirmation, PendingPublish, PublishResult, Publisher, PublisherFactory,
    PublisherFactoryBuilder, RequestId, RoundRobinPublisher, SingleChannelPublisher,
};
pub use error::{ChannelError, FactoryError, ProviderError, PublishError, StopError};
pub use listeners::{NoopListener, ObserveScheduler, PublishEventListener};
pub use message::{DeliveryMode, Message, MessageProperties};
pub use policies::{BackoffAlgorithm, BackoffFn, ExponentialBackoff, JitterPolicy};

// Optional: expose the built-in tracing listener.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use listeners::LogListener;
