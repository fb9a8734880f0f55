//! Retry delay policies.
//!
//! ## Contents
//! - [`BackoffAlgorithm`] how long to wait before re-publishing a nacked message
//! - [`ExponentialBackoff`] parameters of the exponential variant (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization to avoid synchronized retries across channels
//!
//! ## Quick wiring
//! ```text
//! PublisherSettings { backoff: BackoffAlgorithm, retry_count, .. }
//!      └─► core::actor::ChannelActor on nack:
//!           - retry budget left?  → backoff.delay(retry) → timer → re-publish
//!           - budget exhausted    → RetriesExhausted
//! ```

mod backoff;
mod jitter;

pub use backoff::{BackoffAlgorithm, BackoffFn, ExponentialBackoff};
pub use jitter::JitterPolicy;
