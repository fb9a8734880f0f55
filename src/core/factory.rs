//! # PublisherFactory: builds independent publisher pools.
//!
//! A factory holds the immutable ingredients of a pool (provider, settings,
//! listener, scheduler). Every [`PublisherFactory::create_publisher`] call
//! builds a fresh pool from them:
//!
//! ```text
//! create_publisher()
//!   ├─► settings.validate()                    (InvalidSettings)
//!   ├─► N × provider.acquire_channel()         (ProviderUnavailable, acquired channels closed)
//!   │     └─► SingleChannelPublisher::new()    (own listener worker per channel)
//!   ├─► N × SingleChannelPublisher::start()    (Start, started publishers stopped)
//!   └─► RoundRobinPublisher::new(publishers)
//! ```
//!
//! Pools share nothing but the provider: stopping one never affects another.
//! Within a pool a slow listener call only delays outcomes of its own channel.

use std::{sync::Arc, time::Duration};

use futures::future::join_all;

use crate::{
    channel::ChannelProvider,
    config::PublisherSettings,
    core::{
        builder::PublisherFactoryBuilder, publisher::Publisher, round_robin::RoundRobinPublisher,
        single::SingleChannelPublisher,
    },
    error::FactoryError,
    listeners::{ObserveScheduler, PublishEventListener},
};

/// Creates round-robin publisher pools over a channel provider.
pub struct PublisherFactory {
    provider: Arc<dyn ChannelProvider>,
    settings: PublisherSettings,
    listener: Arc<dyn PublishEventListener>,
    scheduler: ObserveScheduler,
}

impl PublisherFactory {
    /// Starts building a factory.
    pub fn builder(
        provider: impl ChannelProvider,
        settings: PublisherSettings,
    ) -> PublisherFactoryBuilder {
        PublisherFactoryBuilder::new(provider, settings)
    }

    /// Creates a factory with the no-op listener and the current runtime.
    pub fn new(provider: impl ChannelProvider, settings: PublisherSettings) -> Self {
        Self::builder(provider, settings).build()
    }

    pub(crate) fn new_internal(
        provider: Arc<dyn ChannelProvider>,
        settings: PublisherSettings,
        listener: Arc<dyn PublishEventListener>,
        scheduler: ObserveScheduler,
    ) -> Self {
        Self {
            provider,
            settings,
            listener,
            scheduler,
        }
    }

    /// Settings every pool is built with.
    pub fn settings(&self) -> &PublisherSettings {
        &self.settings
    }

    /// Builds and starts a new pool of `num_channels` channel publishers.
    ///
    /// # Errors
    /// - [`FactoryError::InvalidSettings`] if the settings fail validation.
    /// - [`FactoryError::ProviderUnavailable`] if a channel cannot be acquired.
    /// - [`FactoryError::Start`] if a channel refuses confirm mode.
    ///
    /// On error, every channel acquired by this call is closed again.
    pub async fn create_publisher(&self) -> Result<RoundRobinPublisher, FactoryError> {
        self.settings
            .validate()
            .map_err(FactoryError::InvalidSettings)?;

        let n = self.settings.num_channels;
        tracing::info!(
            channels = n,
            confirms = self.settings.publisher_confirms,
            retry_count = self.settings.retry_count,
            listener = self.listener.name(),
            "creating publisher pool"
        );

        let mut publishers: Vec<Arc<SingleChannelPublisher>> = Vec::with_capacity(n);

        for _ in 0..n {
            match self.provider.acquire_channel().await {
                Ok(channel) => publishers.push(Arc::new(SingleChannelPublisher::new(
                    channel,
                    &self.settings,
                    Arc::clone(&self.listener),
                    &self.scheduler,
                ))),
                Err(e) => {
                    tracing::warn!(
                        acquired = publishers.len(),
                        error = %e,
                        "channel acquisition failed, releasing pool"
                    );
                    release(&publishers).await;
                    return Err(e.into());
                }
            }
        }

        for p in &publishers {
            if let Err(error) = p.start().await {
                let channel = p.channel_number();
                tracing::warn!(channel, error = %error, "channel publisher failed to start, releasing pool");
                release(&publishers).await;
                return Err(FactoryError::Start { channel, error });
            }
        }

        Ok(RoundRobinPublisher::new(
            publishers
                .into_iter()
                .map(|p| p as Arc<dyn Publisher>)
                .collect(),
        ))
    }
}

async fn release(publishers: &[Arc<SingleChannelPublisher>]) {
    join_all(publishers.iter().map(|p| p.stop(Duration::ZERO))).await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::{
        channel::memory::{MemoryProvider, Reply},
        core::request::RequestId,
        error::{ChannelError, ProviderError, PublishError},
        message::Message,
        policies::BackoffAlgorithm,
    };

    #[derive(Default)]
    struct Counter {
        retries: AtomicUsize,
        confirmed: AtomicUsize,
        failed: AtomicUsize,
    }

    #[async_trait]
    impl PublishEventListener for Counter {
        async fn on_confirmed(&self, _id: RequestId) {
            self.confirmed.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_retry(&self, _id: RequestId, _attempt: u32, _reason: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
        async fn on_failed(&self, _id: RequestId, _error: &PublishError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn settings(num_channels: usize) -> PublisherSettings {
        PublisherSettings {
            num_channels,
            retry_count: 2,
            publish_timeout: Duration::from_secs(5),
            backoff: BackoffAlgorithm::fixed(Duration::from_millis(100)),
            ..PublisherSettings::default()
        }
    }

    fn msg() -> Message {
        Message::new("orders", "order.created", "{}")
    }

    #[tokio::test]
    async fn test_pool_acquires_exactly_num_channels() {
        for n in 1..=5 {
            let provider = MemoryProvider::new();
            let factory = PublisherFactory::new(provider.clone(), settings(n));

            let pool = factory.create_publisher().await.unwrap();
            assert_eq!(pool.len(), n);
            assert_eq!(provider.acquired(), n);
        }
    }

    #[tokio::test]
    async fn test_calls_are_spread_in_rotation() {
        let provider = MemoryProvider::new();
        let pool = PublisherFactory::new(provider.clone(), settings(3))
            .create_publisher()
            .await
            .unwrap();

        let pending: Vec<_> = (0..7).map(|_| pool.publish(msg())).collect();
        let mut channels = Vec::new();
        for p in pending {
            channels.push(p.await.unwrap().channel);
        }
        assert_eq!(channels, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[tokio::test]
    async fn test_pools_are_independent() {
        let provider = MemoryProvider::new();
        let factory = PublisherFactory::new(provider.clone(), settings(2));

        let first = factory.create_publisher().await.unwrap();
        let second = factory.create_publisher().await.unwrap();
        assert_eq!(provider.acquired(), 4);

        assert_eq!(first.publish(msg()).await.unwrap().channel, 1);
        assert_eq!(second.publish(msg()).await.unwrap().channel, 3);

        first.stop(Duration::from_millis(100)).await.unwrap();
        assert_eq!(first.publish(msg()).await, Err(PublishError::NotRunning));
        assert_eq!(second.publish(msg()).await.unwrap().channel, 4);
        assert_eq!(provider.closed_channels(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nack_nack_ack_over_three_channels() {
        let provider = MemoryProvider::new();
        provider.script([Reply::Nack, Reply::Nack]);
        let counter = Arc::new(Counter::default());
        let pool = PublisherFactory::builder(provider.clone(), settings(3))
            .with_listener(counter.clone())
            .build()
            .create_publisher()
            .await
            .unwrap();

        let begin = Instant::now();
        let confirmation = pool.publish(msg()).await.unwrap();

        assert!(begin.elapsed() >= Duration::from_millis(200));
        assert_eq!(confirmation.attempts, 3);
        assert_eq!(counter.retries.load(Ordering::SeqCst), 2);
        assert_eq!(counter.confirmed.load(Ordering::SeqCst), 1);
        assert_eq!(counter.failed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_force_fails_within_close_timeout() {
        let provider = MemoryProvider::with_default_reply(Reply::Silent);
        let counter = Arc::new(Counter::default());
        let pool = PublisherFactory::builder(provider.clone(), settings(3))
            .with_listener(counter.clone())
            .build()
            .create_publisher()
            .await
            .unwrap();

        let a = pool.publish(msg());
        let b = pool.publish(msg());
        tokio::time::sleep(Duration::from_millis(1)).await;

        let begin = Instant::now();
        let res = pool.stop(Duration::from_millis(500)).await;
        assert!(begin.elapsed() <= Duration::from_millis(501));
        assert_eq!(res.unwrap_err().unresolved(), 2);

        assert!(matches!(a.await, Err(PublishError::ChannelClosed { .. })));
        assert!(matches!(b.await, Err(PublishError::ChannelClosed { .. })));
        assert_eq!(counter.failed.load(Ordering::SeqCst), 2);
        assert_eq!(provider.closed_channels(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_settings_acquire_nothing() {
        let provider = MemoryProvider::new();
        let factory = PublisherFactory::new(provider.clone(), settings(0));

        assert!(matches!(
            factory.create_publisher().await,
            Err(FactoryError::InvalidSettings(_))
        ));
        assert_eq!(provider.acquired(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_releases_acquired_channels() {
        let provider = MemoryProvider::new();
        provider.fail_after(2);
        let factory = PublisherFactory::new(provider.clone(), settings(3));

        match factory.create_publisher().await {
            Err(FactoryError::ProviderUnavailable(ProviderError::Unavailable { .. })) => {}
            other => panic!("expected ProviderUnavailable, got {:?}", other.err()),
        }
        assert_eq!(provider.closed_channels(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_channel() {
        let provider = MemoryProvider::new();
        provider.refuse_confirm_select(true);
        let factory = PublisherFactory::new(provider.clone(), settings(2));

        match factory.create_publisher().await {
            Err(FactoryError::Start { channel, error }) => {
                assert_eq!(channel, 1);
                assert!(matches!(error, ChannelError::Protocol(_)));
            }
            other => panic!("expected Start error, got {:?}", other.err()),
        }
        assert_eq!(provider.closed_channels(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_confirm_mode_is_skipped_without_confirms() {
        let provider = MemoryProvider::with_default_reply(Reply::Silent);
        provider.refuse_confirm_select(true);
        let settings = PublisherSettings {
            publisher_confirms: false,
            ..settings(2)
        };
        let pool = PublisherFactory::new(provider.clone(), settings)
            .create_publisher()
            .await
            .unwrap();

        assert_eq!(pool.publish(msg()).await.unwrap().attempts, 1);
        assert_eq!(pool.stop(Duration::from_millis(50)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_dedicated_scheduler_runs_listener() {
        let provider = MemoryProvider::new();
        let counter = Arc::new(Counter::default());
        let pool = PublisherFactory::builder(provider, settings(1))
            .with_listener(counter.clone())
            .with_scheduler(ObserveScheduler::from_handle(tokio::runtime::Handle::current()))
            .build()
            .create_publisher()
            .await
            .unwrap();

        pool.publish(msg()).await.unwrap();
        assert_eq!(counter.confirmed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let pool = PublisherFactory::new(MemoryProvider::new(), settings(2))
            .create_publisher()
            .await
            .unwrap();

        assert_eq!(pool.stop(Duration::from_millis(50)).await, Ok(()));
        assert_eq!(pool.stop(Duration::from_millis(50)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_publish_after_stop_reaches_listener() {
        let counter = Arc::new(Counter::default());
        let pool = PublisherFactory::builder(MemoryProvider::new(), settings(2))
            .with_listener(counter.clone())
            .build()
            .create_publisher()
            .await
            .unwrap();

        assert_eq!(pool.stop(Duration::from_millis(50)).await, Ok(()));
        assert_eq!(pool.publish(msg()).await, Err(PublishError::NotRunning));
        assert_eq!(pool.publish(msg()).await, Err(PublishError::NotRunning));
        assert_eq!(counter.failed.load(Ordering::SeqCst), 2);
    }

    /// Holds up the confirm callback of one chosen request.
    #[derive(Default)]
    struct HoldsOne {
        held: std::sync::Mutex<Option<RequestId>>,
    }

    #[async_trait]
    impl PublishEventListener for HoldsOne {
        async fn on_confirmed(&self, id: RequestId) {
            let held = *self.held.lock().unwrap();
            if held == Some(id) {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_listener_only_delays_its_own_channel() {
        let listener = Arc::new(HoldsOne::default());
        let pool = PublisherFactory::builder(MemoryProvider::new(), settings(2))
            .with_listener(listener.clone())
            .build()
            .create_publisher()
            .await
            .unwrap();

        let slow = pool.publish(msg());
        *listener.held.lock().unwrap() = Some(slow.request_id());
        let fast = pool.publish(msg());

        let res = tokio::time::timeout(Duration::from_secs(1), fast).await;
        assert!(matches!(res, Ok(Ok(_))));

        let res = tokio::time::timeout(Duration::from_secs(20), slow).await;
        assert!(matches!(res, Ok(Ok(_))));
    }
}
