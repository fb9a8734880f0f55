//! # Jitter applied to exponential retry delays.
//!
//! When many channels are nacked by the same broker hiccup, they tend to retry
//! in lockstep. [`JitterPolicy`] spreads those retries out.
//!
//! - [`JitterPolicy::None`] keeps the computed delay as is
//! - [`JitterPolicy::Full`] picks a delay in `[0, delay]`
//! - [`JitterPolicy::Equal`] picks a delay in `[delay/2, delay]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay. Predictable, useful in tests.
    #[default]
    None,
    /// Uniform delay in `[0, delay]`.
    Full,
    /// `delay/2` plus a uniform value in `[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies the jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }

        let mut rng = rand::rng();
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rng.random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }
}
