#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::DbPool;
use crate::adapters::database::contact_repo::ContactRepository;
use crate::adapters::database::conversation_action_repo::ConversationActionRepository;
use crate::adapters::database::conversation_repo::ConversationRepository;
use crate::adapters::database::directory_repo::DirectoryRepository;
use crate::adapters::database::favourite_repo::FavouriteRepository;
use crate::adapters::database::member_repo::MemberRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::adapters::database::notification_repo::NotificationRepository;
use crate::adapters::database::preference_repo::PreferenceRepository;
use crate::adapters::redis::{IndexStream, NotificationChannel, RedisClient};
use crate::config::Config;
use crate::services::access::{AccessOracle, DirectoryOracle};
use crate::services::aggregation_service::AggregationService;
use crate::services::area::{AreaResolver, LinkedAreaResolver};
use crate::services::contact_service::ContactService;
use crate::services::conversation_service::ConversationService;
use crate::services::dispatch::{DispatchService, NotificationDispatcher, RedisDispatcher, TracingDispatcher};
use crate::services::favourite_service::FavouriteService;
use crate::services::message_service::{MessageDeps, MessageService};
use crate::services::notification_service::NotificationService;
use crate::services::privacy_service::PrivacyService;
use crate::workers::SearchIndexWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Every public entry point of the messaging core.
#[derive(Clone, Debug)]
pub struct Services {
    pub conversations: ConversationService,
    pub messages: MessageService,
    pub aggregation: AggregationService,
    pub contacts: ContactService,
    pub privacy: PrivacyService,
    pub favourites: FavouriteService,
    pub notifications: NotificationService,
}

#[derive(Debug, Default)]
pub struct Workers {
    pub search_index: Option<SearchIndexWorker>,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(worker) = self.search_index {
            tasks.push(tokio::spawn(worker.run(shutdown_rx)));
        }
        tasks
    }
}

#[derive(Debug)]
pub struct App {
    pub services: Services,
    pub workers: Workers,
}

/// Wires repositories, collaborators and services together.
///
/// The database is required. Without Redis, notifications are only logged and the search
/// index feeder is not started. The dispatcher, oracle and area resolver can be replaced.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    redis: Option<Arc<RedisClient>>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
    oracle: Option<Arc<dyn AccessOracle>>,
    areas: Option<Arc<dyn AreaResolver>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, redis: None, dispatcher: None, oracle: None, areas: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_redis(mut self, redis: Arc<RedisClient>) -> Self {
        self.redis = Some(redis);
        self
    }

    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn AccessOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    #[must_use]
    pub fn with_area_resolver(mut self, areas: Arc<dyn AreaResolver>) -> Self {
        self.areas = Some(areas);
        self
    }

    /// # Errors
    /// Returns an error if no database pool was provided.
    pub fn build(self) -> anyhow::Result<App> {
        let pool = self.pool.ok_or_else(|| anyhow::anyhow!("Database pool is required"))?;
        let config = self.config;

        let directory_repo = DirectoryRepository::new();
        let conversation_repo = ConversationRepository::new();
        let member_repo = MemberRepository::new();
        let message_repo = MessageRepository::new();
        let action_repo = ConversationActionRepository::new();
        let contact_repo = ContactRepository::new();

        let oracle: Arc<dyn AccessOracle> = self
            .oracle
            .unwrap_or_else(|| Arc::new(DirectoryOracle::new(pool.clone(), directory_repo.clone())));
        let areas: Arc<dyn AreaResolver> = self
            .areas
            .unwrap_or_else(|| Arc::new(LinkedAreaResolver::new(pool.clone(), directory_repo.clone())));
        let dispatcher: Arc<dyn NotificationDispatcher> = match (self.dispatcher, &self.redis) {
            (Some(dispatcher), _) => dispatcher,
            (None, Some(redis)) => Arc::new(RedisDispatcher::new(NotificationChannel::new(
                Arc::clone(redis),
                config.pubsub.channel_prefix.clone(),
            ))),
            (None, None) => Arc::new(TracingDispatcher),
        };
        let dispatch = DispatchService::new(dispatcher);

        let favourites = FavouriteService::new(pool.clone(), FavouriteRepository::new());
        let contacts = ContactService::new(pool.clone(), contact_repo.clone(), dispatch.clone());
        let privacy = PrivacyService::new(
            pool.clone(),
            Arc::clone(&oracle),
            contact_repo,
            PreferenceRepository::new(),
            conversation_repo.clone(),
            member_repo.clone(),
            config.messaging.clone(),
        );

        let conversations = ConversationService::new(
            pool.clone(),
            conversation_repo.clone(),
            member_repo.clone(),
            action_repo.clone(),
            message_repo.clone(),
            favourites.clone(),
            Arc::clone(&oracle),
            config.messaging.clone(),
        );

        let messages = MessageService::new(
            pool.clone(),
            message_repo.clone(),
            conversation_repo.clone(),
            member_repo.clone(),
            action_repo,
            directory_repo.clone(),
            MessageDeps {
                privacy: privacy.clone(),
                oracle: Arc::clone(&oracle),
                dispatch,
                areas: Arc::clone(&areas),
            },
        );

        let aggregation = AggregationService::new(
            pool.clone(),
            conversation_repo,
            member_repo,
            message_repo,
            directory_repo,
            contacts.clone(),
            privacy.clone(),
            oracle,
            areas,
            config.messaging.clone(),
        );

        let notifications = NotificationService::new(pool, NotificationRepository::new());

        let search_index = match &self.redis {
            Some(redis) if config.indexer.enabled => Some(SearchIndexWorker::new(
                messages.clone(),
                IndexStream::new(
                    Arc::clone(redis),
                    config.indexer.stream_key.clone(),
                    config.indexer.cursor_key.clone(),
                ),
                config.indexer.clone(),
            )),
            _ => None,
        };

        Ok(App {
            services: Services { conversations, messages, aggregation, contacts, privacy, favourites, notifications },
            workers: Workers { search_index },
        })
    }
}

/// Applies pending migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Routes panics through tracing so they reach the configured log sinks.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(|l| format!("{}:{}", l.file(), l.line()));
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        tracing::error!(location = location.as_deref().unwrap_or("unknown"), payload, "Panic occurred");
    }));
}

/// Flips the shutdown flag on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
            () = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });
}
