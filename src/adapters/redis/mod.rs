use crate::config::PubSubConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod index_stream;
pub mod notification_channel;

pub use index_stream::IndexStream;
pub use notification_channel::NotificationChannel;

#[derive(Debug)]
pub struct RedisClient {
    publisher: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or every connection attempt fails.
    pub async fn connect(config: &PubSubConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.url.as_str())?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(config.max_backoff_secs))
            .with_max_times(config.connect_attempts);

        let publisher = (|| async { client.get_connection_manager().await })
            .retry(&retry_strategy)
            .when(|e| {
                tracing::warn!(error = %e, "Failed to connect to Redis, retrying...");
                true
            })
            .notify(|e, duration| {
                tracing::debug!("Redis connection retry in {:?} due to error: {:?}", duration, e);
            })
            .await?;

        tracing::info!("Connected to Redis");
        Ok(Arc::new(Self { publisher }))
    }

    /// Returns a connection that can be used for standard Redis commands.
    #[must_use]
    pub fn publisher(&self) -> redis::aio::ConnectionManager {
        self.publisher.clone()
    }

    /// Pings the Redis server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.publisher();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
