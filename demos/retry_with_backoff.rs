//! # Example: retry_with_backoff
//!
//! Publishes one message to an in-memory broker that nacks it twice before
//! acking, showing how the pool retries on the same channel with exponential
//! backoff and jitter.
//!
//! ## Flow
//! ```text
//! ChannelActor
//!   ├─► write attempt=1 ─► nack ─► on_retry(attempt=1), sleep(≈100ms)
//!   ├─► write attempt=2 ─► nack ─► on_retry(attempt=2), sleep(≈200ms)
//!   └─► write attempt=3 ─► ack  ─► on_confirmed
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_with_backoff
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chanpool::{
    BackoffAlgorithm, ExponentialBackoff, JitterPolicy, Message, PublishError,
    PublishEventListener, Publisher, PublisherFactory, PublisherSettings, RequestId,
    channel::memory::{MemoryProvider, Reply},
};

/// Prints every callback.
struct Console;

#[async_trait]
impl PublishEventListener for Console {
    async fn on_published(&self, id: RequestId, attempt: u32) {
        println!("[{id}] written, attempt {attempt}");
    }

    async fn on_confirmed(&self, id: RequestId) {
        println!("[{id}] confirmed");
    }

    async fn on_retry(&self, id: RequestId, attempt: u32, reason: &str) {
        println!("[{id}] attempt {attempt} {reason}, retrying");
    }

    async fn on_failed(&self, id: RequestId, error: &PublishError) {
        println!("[{id}] failed: {error}");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Broker that nacks the first two writes
    let broker = MemoryProvider::new();
    broker.script([Reply::Nack, Reply::Nack]);

    // 2. Exponential backoff with equal jitter
    let settings = PublisherSettings {
        num_channels: 2,
        retry_count: 3,
        backoff: BackoffAlgorithm::Exponential(ExponentialBackoff {
            first: Duration::from_millis(100),
            max: Duration::from_secs(2),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        }),
        ..PublisherSettings::default()
    };

    // 3. Build the pool
    let pool = PublisherFactory::builder(broker.clone(), settings)
        .with_listener(Arc::new(Console))
        .build()
        .create_publisher()
        .await?;

    // 4. Publish and wait for the outcome
    let message = Message::new("orders", "order.created", r#"{"id":42}"#)
        .with_content_type("application/json");
    let confirmation = pool.publish(message).await?;
    println!(
        "confirmed on channel {} after {} attempt(s)",
        confirmation.channel, confirmation.attempts
    );
    println!("broker saw writes on channels {:?}", broker.delivery_channels());

    pool.stop(Duration::from_secs(1)).await?;
    Ok(())
}
