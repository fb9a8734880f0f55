//! Error types used by the publishers, the factory and channel implementations.
//!
//! - [`PublishError`] terminal outcome of a single publish request.
//! - [`ChannelError`] raised by [`Channel`](crate::Channel) implementations.
//! - [`ProviderError`] raised when a channel cannot be acquired.
//! - [`FactoryError`] raised by [`PublisherFactory::create_publisher`](crate::PublisherFactory::create_publisher).
//! - [`StopError`] raised when a publisher could not drain within its close timeout.
//!
//! Every enum provides `as_label` (stable snake_case label for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Terminal failure of a publish request.
///
/// A nack is not an error by itself: it consumes retry budget and only
/// surfaces as [`PublishError::RetriesExhausted`] once the budget is spent.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The channel rejected the write; the channel is presumed broken, no retry.
    #[error("write failed: {error}")]
    WriteFailure {
        /// The underlying channel error message.
        error: String,
    },

    /// The broker nacked every attempt.
    #[error("broker nacked the message {attempts} times; retries exhausted")]
    RetriesExhausted {
        /// Total number of attempts made (first publish included).
        attempts: u32,
    },

    /// No confirm arrived within the publish timeout.
    #[error("no confirm within {timeout:?}")]
    Timeout {
        /// The configured publish timeout.
        timeout: Duration,
    },

    /// The channel went away (transport failure or publisher stop) while the request was pending.
    #[error("channel closed: {reason}")]
    ChannelClosed {
        /// Why the channel closed.
        reason: String,
    },

    /// The publisher is not accepting messages (never started, or stopping).
    #[error("publisher is not running")]
    NotRunning,
}

impl PublishError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use chanpool::PublishError;
    ///
    /// let err = PublishError::RetriesExhausted { attempts: 3 };
    /// assert_eq!(err.as_label(), "publish_retries_exhausted");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PublishError::WriteFailure { .. } => "publish_write_failure",
            PublishError::RetriesExhausted { .. } => "publish_retries_exhausted",
            PublishError::Timeout { .. } => "publish_timeout",
            PublishError::ChannelClosed { .. } => "publish_channel_closed",
            PublishError::NotRunning => "publish_not_running",
        }
    }

    pub(crate) fn channel_closed(reason: impl Into<String>) -> Self {
        PublishError::ChannelClosed {
            reason: reason.into(),
        }
    }
}

/// # Errors raised by a [`Channel`](crate::Channel) implementation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The frame could not be written.
    #[error("write rejected: {0}")]
    Write(String),

    /// The channel (or its connection) is closed.
    #[error("channel closed: {0}")]
    Closed(String),

    /// The broker refused a protocol operation (e.g. `confirm.select`).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ChannelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::Write(_) => "channel_write",
            ChannelError::Closed(_) => "channel_closed",
            ChannelError::Protocol(_) => "channel_protocol",
        }
    }
}

/// # Errors raised by a [`ChannelProvider`](crate::ChannelProvider).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The underlying connection cannot produce a channel.
    #[error("channel provider unavailable: {reason}")]
    Unavailable {
        /// Provider supplied detail.
        reason: String,
    },
}

/// # Errors raised while building a publisher pool.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FactoryError {
    /// Settings failed validation; nothing was acquired.
    #[error("invalid publisher settings: {0}")]
    InvalidSettings(&'static str),

    /// A channel could not be acquired; channels acquired so far were closed.
    #[error(transparent)]
    ProviderUnavailable(#[from] ProviderError),

    /// A channel was acquired but could not be prepared for publishing.
    #[error("failed to start publisher on channel {channel}: {error}")]
    Start {
        /// Channel number that failed.
        channel: u16,
        /// The channel error.
        error: ChannelError,
    },
}

impl FactoryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FactoryError::InvalidSettings(_) => "factory_invalid_settings",
            FactoryError::ProviderUnavailable(_) => "factory_provider_unavailable",
            FactoryError::Start { .. } => "factory_start_failed",
        }
    }
}

/// # Errors raised by `stop`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    /// Close timeout elapsed with requests still unconfirmed; they were force-failed.
    #[error("close timeout {timeout:?} exceeded; {unresolved} request(s) force-failed")]
    CloseTimeout {
        /// The close timeout that was applied.
        timeout: Duration,
        /// How many requests were force-failed.
        unresolved: usize,
    },
}

impl StopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StopError::CloseTimeout { .. } => "stop_close_timeout",
        }
    }

    /// Number of requests force-failed by the stop.
    pub fn unresolved(&self) -> usize {
        match self {
            StopError::CloseTimeout { unresolved, .. } => *unresolved,
        }
    }
}
