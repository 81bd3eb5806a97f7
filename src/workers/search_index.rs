use crate::adapters::redis::IndexStream;
use crate::config::IndexerConfig;
use crate::domain::message::{IndexCursor, IndexableMessage};
use crate::services::message_service::MessageService;
use opentelemetry::{global, metrics::Counter};
use std::time::Duration;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    indexed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("colloquy");
        Self {
            indexed_total: meter
                .u64_counter("colloquy_messages_indexed_total")
                .with_description("Total messages appended to the search index stream")
                .build(),
        }
    }
}

/// Feeds new messages to the search index stream, resuming from the cursor kept in Redis.
#[derive(Debug)]
pub struct SearchIndexWorker {
    messages: MessageService,
    stream: IndexStream,
    config: IndexerConfig,
    metrics: Metrics,
}

impl SearchIndexWorker {
    #[must_use]
    pub fn new(messages: MessageService, stream: IndexStream, config: IndexerConfig) -> Self {
        Self { messages, stream, config, metrics: Metrics::new() }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain(&shutdown)
                        .instrument(tracing::info_span!("search_index_iteration"))
                        .await
                    {
                        tracing::error!(error = ?e, "Search index iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Search index loop shutting down...");
    }

    /// Pages through every message after the saved cursor. Stops early on shutdown.
    async fn drain(&self, shutdown: &tokio::sync::watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut cursor = self.stream.load_cursor().await?;

        loop {
            let indexed = self.index_batch(cursor).await?;
            match indexed {
                Some(next) if !*shutdown.borrow() => cursor = Some(next),
                _ => return Ok(()),
            }
        }
    }

    /// Indexes one batch after `cursor` and saves the new position. Returns that position
    /// when the batch was full and more messages may follow.
    ///
    /// # Errors
    /// Returns an error if the batch cannot be read, appended or checkpointed.
    #[tracing::instrument(skip(self), err, fields(indexed = tracing::field::Empty))]
    pub async fn index_batch(&self, cursor: Option<IndexCursor>) -> anyhow::Result<Option<IndexCursor>> {
        let batch = self.messages.fetch_index_batch(cursor, self.config.batch_size).await?;
        let Some(last) = batch.last() else {
            return Ok(None);
        };
        let next = IndexCursor::after(last);

        for message in &batch {
            self.stream.append(&document(message)?).await?;
        }
        // A crash before this point re-sends the batch; the index treats ids as upserts.
        self.stream.save_cursor(&next).await?;

        tracing::Span::current().record("indexed", batch.len());
        self.metrics.indexed_total.add(batch.len() as u64, &[]);

        let full = i64::try_from(batch.len()).is_ok_and(|n| n >= self.config.batch_size);
        Ok(full.then_some(next))
    }
}

fn document(message: &IndexableMessage) -> anyhow::Result<String> {
    Ok(serde_json::to_string(message)?)
}
