//! # Publisher settings.
//!
//! Provides [`PublisherSettings`], the immutable configuration shared by every
//! channel publisher a [`PublisherFactory`](crate::PublisherFactory) builds.
//!
//! ## Sentinel values
//! - `publish_timeout = 0s` → no per-request deadline
//! - `max_in_flight = 0` → unbounded in-flight window

use std::time::Duration;

use crate::policies::BackoffAlgorithm;

/// Configuration for a pool of channel publishers.
///
/// ## Field semantics
/// - `num_channels`: number of channels (and channel publishers) per pool, must be `> 0`
/// - `publisher_confirms`: wait for broker confirms (`false` = fire-and-forget)
/// - `retry_count`: re-publishes allowed after nacks (`0` = fail on first nack)
/// - `publish_timeout`: deadline for a confirm, measured from submission (`0s` = none)
/// - `close_timeout`: how long `stop` drains in-flight confirms
/// - `backoff`: delay before each retry
/// - `max_in_flight`: written-but-unconfirmed requests per channel (`0` = unbounded)
#[derive(Clone, Debug)]
pub struct PublisherSettings {
    /// Number of channels opened per pool.
    pub num_channels: usize,
    /// Whether the channels run in confirm mode.
    pub publisher_confirms: bool,
    /// Number of retries after a nack.
    pub retry_count: u32,
    /// Per-request confirm deadline.
    pub publish_timeout: Duration,
    /// Drain budget used by `stop`.
    pub close_timeout: Duration,
    /// Retry delay strategy.
    pub backoff: BackoffAlgorithm,
    /// In-flight window per channel.
    pub max_in_flight: usize,
}

impl PublisherSettings {
    /// Returns the per-request deadline as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → requests fail with `Timeout` after `d`
    #[inline]
    pub fn publish_deadline(&self) -> Option<Duration> {
        if self.publish_timeout == Duration::ZERO {
            None
        } else {
            Some(self.publish_timeout)
        }
    }

    /// Returns the in-flight window as an `Option` (`None` = unbounded).
    #[inline]
    pub fn in_flight_limit(&self) -> Option<usize> {
        if self.max_in_flight == 0 {
            None
        } else {
            Some(self.max_in_flight)
        }
    }

    /// Checks the settings before any channel is acquired.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.num_channels == 0 {
            return Err("num_channels must be greater than zero");
        }
        if self.num_channels > usize::from(u16::MAX) {
            return Err("num_channels exceeds the channel number space");
        }
        Ok(())
    }
}

impl Default for PublisherSettings {
    /// Default configuration:
    ///
    /// - `num_channels = 1`
    /// - `publisher_confirms = true`
    /// - `retry_count = 3`
    /// - `publish_timeout = 30s`
    /// - `close_timeout = 5s`
    /// - `backoff = Fixed(100ms)`
    /// - `max_in_flight = 0` (unbounded)
    fn default() -> Self {
        Self {
            num_channels: 1,
            publisher_confirms: true,
            retry_count: 3,
            publish_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
            backoff: BackoffAlgorithm::default(),
            max_in_flight: 0,
        }
    }
}
