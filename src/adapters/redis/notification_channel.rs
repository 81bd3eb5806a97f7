use crate::adapters::redis::RedisClient;
use redis::AsyncCommands;
use std::sync::Arc;

/// Per-user pub/sub channels that dispatched notifications are published to.
#[derive(Debug, Clone)]
pub struct NotificationChannel {
    redis: Arc<RedisClient>,
    channel_prefix: String,
}

impl NotificationChannel {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, channel_prefix: String) -> Self {
        Self { redis, channel_prefix }
    }

    #[must_use]
    pub fn channel_for(&self, user_id: i64) -> String {
        format!("{}{user_id}", self.channel_prefix)
    }

    /// Publishes a payload to a user's channel. Returns the number of subscribers reached.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn publish(&self, user_id: i64, payload: &[u8]) -> anyhow::Result<i64> {
        let channel_name = self.channel_for(user_id);
        let mut conn = self.redis.publisher();
        let receivers = conn.publish::<_, _, i64>(&channel_name, payload).await?;
        Ok(receivers)
    }
}
