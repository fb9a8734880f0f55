//! # RoundRobinPublisher: a pool of channel publishers.
//!
//! Each `publish` picks the next publisher with an atomic cursor, so call `i`
//! (counting from the first call on this instance) goes to publisher `i mod N`
//! no matter how many threads submit concurrently. A request stays on the
//! publisher it was handed to for all of its retries.
//!
//! `start` and `stop` fan out to every publisher concurrently.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::future::join_all;

use crate::{
    core::{
        publisher::Publisher,
        request::{PendingPublish, RequestId},
    },
    error::{ChannelError, PublishError, StopError},
    message::Message,
};

/// Distributes messages across a fixed set of publishers in strict rotation.
pub struct RoundRobinPublisher {
    publishers: Vec<Arc<dyn Publisher>>,
    cursor: AtomicUsize,
}

impl RoundRobinPublisher {
    /// Creates a pool over `publishers`, in the given rotation order.
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self {
            publishers,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Number of publishers in the pool.
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// True if the pool has no publishers.
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    fn next_index(&self) -> usize {
        let n = self.publishers.len();
        match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % n))
        {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

#[async_trait]
impl Publisher for RoundRobinPublisher {
    fn publish(&self, message: Message) -> PendingPublish {
        if self.publishers.is_empty() {
            // no channel publisher, so no listener to report to
            return PendingPublish::rejected(RequestId::next(), PublishError::NotRunning);
        }
        self.publishers[self.next_index()].publish(message)
    }

    async fn start(&self) -> Result<(), ChannelError> {
        let results = join_all(self.publishers.iter().map(|p| p.start())).await;
        results.into_iter().collect()
    }

    /// Stops every publisher. Failures are folded into the worst one, carrying
    /// the number of requests force-failed across the whole pool.
    async fn stop(&self, timeout: Duration) -> Result<(), StopError> {
        let errors: Vec<StopError> = join_all(self.publishers.iter().map(|p| p.stop(timeout)))
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        let total: usize = errors.iter().map(StopError::unresolved).sum();
        match errors.into_iter().max_by_key(StopError::unresolved) {
            Some(StopError::CloseTimeout { timeout, .. }) => Err(StopError::CloseTimeout {
                timeout,
                unresolved: total,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        channel::{
            ChannelProvider,
            memory::{MemoryProvider, Reply},
        },
        config::PublisherSettings,
        core::single::SingleChannelPublisher,
        listeners::{NoopListener, ObserveScheduler},
    };

    /// Publisher that only records which slot received each call.
    struct Slot {
        index: usize,
        calls: Arc<Mutex<Vec<usize>>>,
        stop_result: Result<(), StopError>,
    }

    #[async_trait]
    impl Publisher for Slot {
        fn publish(&self, _message: Message) -> PendingPublish {
            self.calls.lock().unwrap().push(self.index);
            PendingPublish::rejected(RequestId::next(), PublishError::NotRunning)
        }

        async fn start(&self) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn stop(&self, _timeout: Duration) -> Result<(), StopError> {
            self.stop_result.clone()
        }
    }

    fn slots(n: usize, calls: &Arc<Mutex<Vec<usize>>>) -> Vec<Arc<dyn Publisher>> {
        (0..n)
            .map(|index| {
                Arc::new(Slot {
                    index,
                    calls: Arc::clone(calls),
                    stop_result: Ok(()),
                }) as Arc<dyn Publisher>
            })
            .collect()
    }

    fn msg() -> Message {
        Message::new("ex", "rk", "x")
    }

    #[test]
    fn test_calls_rotate_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pool = RoundRobinPublisher::new(slots(3, &calls));

        for _ in 0..7 {
            drop(pool.publish(msg()));
        }
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_concurrent_submitters_share_the_rotation_evenly() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let pool = Arc::new(RoundRobinPublisher::new(slots(4, &calls)));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        drop(pool.publish(msg()));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 800);
        for index in 0..4 {
            assert_eq!(calls.iter().filter(|c| **c == index).count(), 200);
        }
    }

    #[tokio::test]
    async fn test_empty_pool_rejects() {
        let pool = RoundRobinPublisher::new(Vec::new());
        assert!(pool.is_empty());
        assert_eq!(pool.publish(msg()).await, Err(PublishError::NotRunning));
    }

    #[tokio::test]
    async fn test_stop_reports_pool_total() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let failing = |unresolved| {
            Arc::new(Slot {
                index: 0,
                calls: Arc::clone(&calls),
                stop_result: Err(StopError::CloseTimeout {
                    timeout: Duration::from_millis(10),
                    unresolved,
                }),
            }) as Arc<dyn Publisher>
        };
        let mut publishers = slots(1, &calls);
        publishers.push(failing(2));
        publishers.push(failing(5));
        let pool = RoundRobinPublisher::new(publishers);

        assert_eq!(
            pool.stop(Duration::from_millis(10)).await,
            Err(StopError::CloseTimeout {
                timeout: Duration::from_millis(10),
                unresolved: 7
            })
        );
    }

    #[tokio::test]
    async fn test_retries_stay_on_the_original_channel() {
        let provider = MemoryProvider::new();
        provider.script([Reply::Nack]);
        let settings = PublisherSettings {
            num_channels: 2,
            ..PublisherSettings::default()
        };
        let scheduler = ObserveScheduler::current();

        let mut publishers: Vec<Arc<dyn Publisher>> = Vec::new();
        for _ in 0..2 {
            let channel = provider.acquire_channel().await.unwrap();
            let p = SingleChannelPublisher::new(channel, &settings, Arc::new(NoopListener), &scheduler);
            p.start().await.unwrap();
            publishers.push(Arc::new(p));
        }
        let pool = RoundRobinPublisher::new(publishers);

        let confirmation = pool.publish(msg()).await.unwrap();
        assert_eq!(confirmation.channel, 1);
        assert_eq!(confirmation.attempts, 2);
        assert_eq!(provider.delivery_channels(), vec![1, 1]);

        assert_eq!(pool.publish(msg()).await.unwrap().channel, 2);
        assert_eq!(pool.stop(Duration::from_millis(100)).await, Ok(()));
    }
}
