//! # Observation scheduler.
//!
//! Decides which runtime runs listener callbacks and caller completions.
//!
//! - [`ObserveScheduler::current`] (default): the runtime that creates the
//!   publisher, i.e. its shared worker pool.
//! - [`ObserveScheduler::from_handle`]: a dedicated runtime, e.g. to keep a slow
//!   listener away from the runtime driving channel I/O.

use std::future::Future;

use tokio::{runtime::Handle, task::JoinHandle};

/// Execution context for observation work.
#[derive(Clone, Debug, Default)]
pub struct ObserveScheduler {
    handle: Option<Handle>,
}

impl ObserveScheduler {
    /// Uses the runtime that is current when the work is spawned.
    pub fn current() -> Self {
        Self { handle: None }
    }

    /// Uses the given runtime.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub(crate) fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match &self.handle {
            Some(handle) => handle.spawn(fut),
            None => tokio::spawn(fut),
        }
    }
}
