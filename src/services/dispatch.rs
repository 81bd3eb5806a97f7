use crate::adapters::redis::NotificationChannel;
use crate::domain::notification::DispatchPayload;
use async_trait::async_trait;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

/// Delivery hook fired once per recipient. Delivery and retries are the implementation's concern.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync + std::fmt::Debug {
    /// Hands a payload to the delivery mechanism for a single user.
    ///
    /// # Errors
    /// Returns an error if the payload could not be handed off.
    async fn send_to(&self, user_id: i64, payload: &DispatchPayload) -> anyhow::Result<()>;
}

/// Logs every payload. Used when no delivery backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn send_to(&self, user_id: i64, payload: &DispatchPayload) -> anyhow::Result<()> {
        tracing::info!(user_id, kind = payload.kind(), "Notification dispatched");
        Ok(())
    }
}

/// Publishes JSON payloads on the recipient's Redis channel.
#[derive(Debug, Clone)]
pub struct RedisDispatcher {
    channel: NotificationChannel,
}

impl RedisDispatcher {
    #[must_use]
    pub const fn new(channel: NotificationChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationDispatcher for RedisDispatcher {
    async fn send_to(&self, user_id: i64, payload: &DispatchPayload) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        let receivers = self.channel.publish(user_id, &body).await?;
        tracing::trace!(user_id, receivers, "Published notification");
        Ok(())
    }
}

#[derive(Clone, Debug)]
struct Metrics {
    dispatched_total: Counter<u64>,
    failures_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("colloquy");
        Self {
            dispatched_total: meter
                .u64_counter("colloquy_notifications_dispatched_total")
                .with_description("Total notifications handed to the dispatcher")
                .build(),
            failures_total: meter
                .u64_counter("colloquy_dispatch_failures_total")
                .with_description("Notifications the dispatcher failed to accept")
                .build(),
        }
    }
}

/// Fan-out front of the configured dispatcher. Failures are logged, never returned.
#[derive(Clone, Debug)]
pub struct DispatchService {
    dispatcher: Arc<dyn NotificationDispatcher>,
    metrics: Metrics,
}

impl DispatchService {
    #[must_use]
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher, metrics: Metrics::new() }
    }

    pub async fn notify(&self, user_id: i64, payload: &DispatchPayload) {
        let kind = KeyValue::new("kind", payload.kind());
        match self.dispatcher.send_to(user_id, payload).await {
            Ok(()) => self.metrics.dispatched_total.add(1, &[kind]),
            Err(e) => {
                tracing::warn!(error = %e, user_id, kind = payload.kind(), "Failed to dispatch notification");
                self.metrics.failures_total.add(1, &[kind]);
            }
        }
    }

    /// Sends each recipient the payload built for them, in order.
    pub async fn notify_all(&self, user_ids: &[i64], payload_for: impl Fn(i64) -> DispatchPayload) {
        for &user_id in user_ids {
            let payload = payload_for(user_id);
            self.notify(user_id, &payload).await;
        }
    }
}
