//! # Publish observation.
//!
//! This module provides the [`PublishEventListener`] trait, the built-in
//! listeners, and the machinery that runs them off the channel I/O path.
//!
//! ## Architecture
//! ```text
//! ChannelActor ── Notifier::{published, retry, resolve} ──► notifier worker (on ObserveScheduler)
//!                                                               │
//!                                                   ┌───────────┴───────────┐
//!                                                   ▼                       ▼
//!                                        listener.on_*() callbacks   caller's PendingPublish
//! ```
//!
//! ## Implementing custom listeners
//! ```no_run
//! use chanpool::{PublishError, PublishEventListener, RequestId};
//! use async_trait::async_trait;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! #[derive(Default)]
//! struct FailureCounter(AtomicU64);
//!
//! #[async_trait]
//! impl PublishEventListener for FailureCounter {
//!     async fn on_failed(&self, _id: RequestId, _error: &PublishError) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

mod listener;
#[cfg(feature = "logging")]
mod log;
mod notifier;
mod scheduler;

pub use listener::{NoopListener, PublishEventListener};
#[cfg(feature = "logging")]
pub use log::LogListener;
pub(crate) use notifier::Notifier;
pub use scheduler::ObserveScheduler;
