use std::sync::Arc;

use crate::{
    channel::ChannelProvider,
    config::PublisherSettings,
    listeners::{NoopListener, ObserveScheduler, PublishEventListener},
};

use super::factory::PublisherFactory;

/// Builder for a [`PublisherFactory`] with optional observation hooks.
pub struct PublisherFactoryBuilder {
    provider: Arc<dyn ChannelProvider>,
    settings: PublisherSettings,
    listener: Arc<dyn PublishEventListener>,
    scheduler: ObserveScheduler,
}

impl PublisherFactoryBuilder {
    /// Creates a builder over `provider` with the given settings.
    pub fn new(provider: impl ChannelProvider, settings: PublisherSettings) -> Self {
        Self {
            provider: Arc::new(provider),
            settings,
            listener: Arc::new(NoopListener),
            scheduler: ObserveScheduler::current(),
        }
    }

    /// Sets the listener notified of every publish outcome.
    ///
    /// Defaults to [`NoopListener`].
    pub fn with_listener(mut self, listener: Arc<dyn PublishEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Sets where listener callbacks and caller completions run.
    ///
    /// Defaults to [`ObserveScheduler::current`].
    pub fn with_scheduler(mut self, scheduler: ObserveScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Freezes the configuration into a factory.
    pub fn build(self) -> PublisherFactory {
        PublisherFactory::new_internal(self.provider, self.settings, self.listener, self.scheduler)
    }
}
