//! # Backoff algorithms for nack-driven re-publishing.
//!
//! A [`BackoffAlgorithm`] maps the **retry number** (1 for the first retry,
//! 2 for the second, ...) to the delay the channel actor waits before writing
//! the message again. It is a pure function: no state is carried between
//! calls, so the same request always sees the same schedule (modulo jitter).
//!
//! - [`BackoffAlgorithm::Fixed`] the same delay before every retry;
//! - [`BackoffAlgorithm::Exponential`] `first × factor^(retry-1)`, clamped to `max`, then jittered;
//! - [`BackoffAlgorithm::Custom`] any `Fn(u32) -> Duration`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use chanpool::{BackoffAlgorithm, ExponentialBackoff, JitterPolicy};
//!
//! let fixed = BackoffAlgorithm::fixed(Duration::from_millis(100));
//! assert_eq!(fixed.delay(1), Duration::from_millis(100));
//! assert_eq!(fixed.delay(7), Duration::from_millis(100));
//!
//! let exp = BackoffAlgorithm::Exponential(ExponentialBackoff {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! });
//! assert_eq!(exp.delay(1), Duration::from_millis(100));
//! assert_eq!(exp.delay(2), Duration::from_millis(200));
//! assert_eq!(exp.delay(20), Duration::from_secs(10));
//!
//! let custom = BackoffAlgorithm::custom(|retry| Duration::from_millis(u64::from(retry) * 50));
//! assert_eq!(custom.delay(3), Duration::from_millis(150));
//! ```

use std::{fmt, sync::Arc, time::Duration};

use crate::policies::jitter::JitterPolicy;

/// Shared backoff function, called with the 1-based retry number.
pub type BackoffFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Exponential growth parameters.
///
/// The base delay for retry `n` is `first × factor^(n-1)`, clamped to
/// [`ExponentialBackoff::max`]. Jitter is applied to the clamped base and never
/// feeds back into the next computation.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` expected).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for ExponentialBackoff {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl ExponentialBackoff {
    /// Computes the delay for the given retry number (1-based).
    ///
    /// Retry `0` is treated like retry `1`. Non-finite or negative
    /// intermediate values clamp to `max`.
    pub fn next(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_secs = self.max.as_secs_f64();
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }
}

/// Strategy deciding how long to wait before each retry.
#[derive(Clone)]
pub enum BackoffAlgorithm {
    /// Constant delay.
    Fixed(Duration),
    /// Exponentially growing delay.
    Exponential(ExponentialBackoff),
    /// User supplied function of the retry number.
    Custom(BackoffFn),
}

impl Default for BackoffAlgorithm {
    /// Returns `Fixed(100ms)`.
    fn default() -> Self {
        BackoffAlgorithm::Fixed(Duration::from_millis(100))
    }
}

impl fmt::Debug for BackoffAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffAlgorithm::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            BackoffAlgorithm::Exponential(e) => f.debug_tuple("Exponential").field(e).finish(),
            BackoffAlgorithm::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl BackoffAlgorithm {
    /// Constant delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        BackoffAlgorithm::Fixed(delay)
    }

    /// Exponential delay with default parameters (100ms doubling up to 30s).
    pub fn exponential() -> Self {
        BackoffAlgorithm::Exponential(ExponentialBackoff::default())
    }

    /// Wraps an arbitrary function of the retry number.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        BackoffAlgorithm::Custom(Arc::new(f))
    }

    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            BackoffAlgorithm::Fixed(d) => *d,
            BackoffAlgorithm::Exponential(e) => e.next(retry),
            BackoffAlgorithm::Custom(f) => f(retry),
        }
    }
}
