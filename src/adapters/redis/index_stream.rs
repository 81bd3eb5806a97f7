use crate::adapters::redis::RedisClient;
use crate::domain::message::IndexCursor;
use redis::AsyncCommands;
use std::sync::Arc;

/// Redis stream that indexable messages are appended to, plus the feeder's saved position.
#[derive(Debug, Clone)]
pub struct IndexStream {
    redis: Arc<RedisClient>,
    stream_key: String,
    cursor_key: String,
}

impl IndexStream {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, stream_key: String, cursor_key: String) -> Self {
        Self { redis, stream_key, cursor_key }
    }

    /// Appends one JSON document to the stream and returns its entry id.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn append(&self, document: &str) -> anyhow::Result<String> {
        let mut conn = self.redis.publisher();
        // XADD key * doc <json>
        let entry_id: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg("doc")
            .arg(document)
            .query_async(&mut conn)
            .await?;
        Ok(entry_id)
    }

    /// Loads the saved cursor. A malformed value is discarded so indexing restarts from the beginning.
    ///
    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn load_cursor(&self) -> anyhow::Result<Option<IndexCursor>> {
        let mut conn = self.redis.publisher();
        let raw: Option<String> = conn.get(&self.cursor_key).await?;

        Ok(raw.and_then(|value| match IndexCursor::decode(&value) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed index cursor");
                None
            }
        }))
    }

    /// # Errors
    /// Returns an error if the Redis operation fails.
    pub async fn save_cursor(&self, cursor: &IndexCursor) -> anyhow::Result<()> {
        let mut conn = self.redis.publisher();
        conn.set::<_, _, ()>(&self.cursor_key, cursor.encode()).await?;
        Ok(())
    }
}
