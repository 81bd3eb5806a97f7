use crate::adapters::database::DbPool;
use crate::adapters::database::conversation_action_repo::ConversationActionRepository;
use crate::adapters::database::conversation_repo::ConversationRepository;
use crate::adapters::database::directory_repo::DirectoryRepository;
use crate::adapters::database::member_repo::MemberRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::domain::capability::{Capability, Scope};
use crate::domain::conversation::{Conversation, ConversationAction, ConversationType};
use crate::domain::message::{
    ConversationMessages, IndexCursor, IndexableMessage, Message, MessageAction, MessageFormat, MessageQuery,
    small_message,
};
use crate::domain::notification::DispatchPayload;
use crate::domain::user::MemberProfile;
use crate::error::{AppError, Result};
use crate::services::access::AccessOracle;
use crate::services::area::AreaResolver;
use crate::services::dispatch::DispatchService;
use crate::services::privacy_service::PrivacyService;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Characters kept in the plain-text preview of a message.
const SMALL_MESSAGE_CHARS: usize = 140;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    index_batch_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("colloquy");
        Self {
            sent_total: meter
                .u64_counter("colloquy_messages_sent_total")
                .with_description("Total message send attempts by outcome")
                .build(),
            index_batch_size: meter
                .u64_histogram("colloquy_index_batch_size")
                .with_description("Number of messages handed to the search indexer in a single batch")
                .build(),
        }
    }
}

/// Collaborators of [`MessageService`] that are shared with other services.
#[derive(Clone, Debug)]
pub struct MessageDeps {
    pub privacy: PrivacyService,
    pub oracle: Arc<dyn AccessOracle>,
    pub dispatch: DispatchService,
    pub areas: Arc<dyn AreaResolver>,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    pool: DbPool,
    repo: MessageRepository,
    conversations: ConversationRepository,
    members: MemberRepository,
    actions: ConversationActionRepository,
    directory: DirectoryRepository,
    deps: MessageDeps,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        repo: MessageRepository,
        conversations: ConversationRepository,
        members: MemberRepository,
        actions: ConversationActionRepository,
        directory: DirectoryRepository,
        deps: MessageDeps,
    ) -> Self {
        Self { pool, repo, conversations, members, actions, directory, deps, metrics: Metrics::new() }
    }

    /// Posts a message and notifies every other member.
    ///
    /// Messages to a self conversation are read on arrival and notify nobody.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::PermissionDenied` if the sender may not post in it.
    #[tracing::instrument(err(level = "warn"), skip(self, text), fields(len = text.len()))]
    pub async fn send_message_to_conversation(
        &self,
        user_id_from: i64,
        conversation_id: i64,
        text: &str,
        format: MessageFormat,
    ) -> Result<Message> {
        let conversation = {
            let mut conn = self.pool.acquire().await?;
            self.conversations.find_by_id(&mut conn, conversation_id).await?.ok_or(AppError::NotFound)?
        };

        if !self.deps.privacy.can_send_message_to_conversation(user_id_from, conversation_id).await? {
            self.metrics.sent_total.add(1, &[KeyValue::new("status", "denied")]);
            return Err(AppError::PermissionDenied("You are not allowed to message this conversation".into()));
        }

        let preview = small_message(text, SMALL_MESSAGE_CHARS);

        let mut tx = self.pool.begin().await?;
        let message = self.repo.create(&mut tx, conversation_id, user_id_from, text, format, &preview).await?;
        if conversation.r#type == ConversationType::SelfConversation {
            self.repo.mark_read(&mut tx, user_id_from, message.id, message.time_created).await?;
        }
        let recipients: Vec<i64> = self
            .members
            .find_member_ids(&mut tx, conversation_id)
            .await?
            .into_iter()
            .filter(|&id| id != user_id_from)
            .collect();
        let muted = self.actions.find_users_with(&mut tx, conversation_id, &recipients, ConversationAction::Muted).await?;
        tx.commit().await?;

        self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);

        if !recipients.is_empty() {
            self.dispatch_message(&conversation, &message, &recipients, &muted).await;
        }

        Ok(message)
    }

    async fn dispatch_message(&self, conversation: &Conversation, message: &Message, recipients: &[i64], muted: &[i64]) {
        let image_url = match &conversation.area {
            Some(area) => match self.deps.areas.resolve(area).await {
                Ok(details) => details.and_then(|d| d.image_url),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to resolve conversation area for notification");
                    None
                }
            },
            None => None,
        };
        let conversation_name = match conversation.r#type {
            ConversationType::Group => conversation.name.clone(),
            ConversationType::Individual | ConversationType::SelfConversation => None,
        };

        self.deps
            .dispatch
            .notify_all(recipients, |user_id| DispatchPayload::ConversationMessage {
                conversation_id: conversation.id,
                conversation_type: conversation.r#type,
                conversation_name: conversation_name.clone(),
                conversation_image_url: image_url.clone(),
                message_id: message.id,
                user_id_from: message.user_id_from,
                small_message: message.small_message.clone(),
                muted: muted.contains(&user_id),
                time_created: message.time_created.unix_timestamp(),
            })
            .await;
    }

    /// Hides a message from one user. Deleting twice has no further effect.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    /// Returns `AppError::PermissionDenied` if the user may not delete it.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_message(&self, user_id: i64, message_id: i64) -> Result<()> {
        let message = {
            let mut conn = self.pool.acquire().await?;
            self.repo.find_by_id(&mut conn, message_id).await?.ok_or(AppError::NotFound)?
        };

        if !self.can_delete_message_in(user_id, &message).await? {
            return Err(AppError::PermissionDenied("You are not allowed to delete this message".into()));
        }

        let mut conn = self.pool.acquire().await?;
        self.repo.insert_action(&mut conn, user_id, message_id, MessageAction::Deleted).await?;
        Ok(())
    }

    /// Members may delete messages for themselves; so may holders of the delete-any capability.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_delete_message(&self, user_id: i64, message_id: i64) -> Result<bool> {
        let message = {
            let mut conn = self.pool.acquire().await?;
            self.repo.find_by_id(&mut conn, message_id).await?
        };
        match message {
            Some(message) => self.can_delete_message_in(user_id, &message).await,
            None => Ok(false),
        }
    }

    async fn can_delete_message_in(&self, user_id: i64, message: &Message) -> Result<bool> {
        let is_member = {
            let mut conn = self.pool.acquire().await?;
            self.members.is_member(&mut conn, message.conversation_id, user_id).await?
        };
        if is_member {
            return Ok(true);
        }
        self.deps.oracle.has_capability(user_id, Capability::DeleteAnyMessage, Scope::System).await
    }

    /// Hides a message from every current member.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_message_for_all_users(&self, message_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_by_id(&mut conn, message_id).await?.ok_or(AppError::NotFound)?;
        let hidden = self.repo.delete_for_all_members(&mut conn, message_id).await?;
        tracing::debug!(hidden, "Message deleted for all members");
        Ok(())
    }

    /// Only group conversations support deletion for everyone, and only for holders of the
    /// delete-any capability.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_delete_message_for_all_users(&self, user_id: i64, conversation_id: i64) -> Result<bool> {
        let conversation = {
            let mut conn = self.pool.acquire().await?;
            self.conversations.find_by_id(&mut conn, conversation_id).await?
        };
        if !conversation.is_some_and(|c| c.r#type == ConversationType::Group) {
            return Ok(false);
        }
        self.deps.oracle.has_capability(user_id, Capability::DeleteAnyMessage, Scope::System).await
    }

    /// Marks a message read for a user. Returns the stored read time; marking it read again
    /// changes nothing.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(err(level = "warn"), skip(self, message), fields(message_id = message.id))]
    pub async fn mark_message_as_read(
        &self,
        user_id: i64,
        message: &Message,
        time_read: Option<OffsetDateTime>,
    ) -> Result<OffsetDateTime> {
        let mut conn = self.pool.acquire().await?;
        let time_read = time_read.unwrap_or_else(OffsetDateTime::now_utc);
        self.repo.mark_read(&mut conn, user_id, message.id, time_read).await
    }

    /// Marks every unread message sent by others as read, in one conversation or all of them.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mark_all_messages_as_read(&self, user_id: i64, conversation_id: Option<i64>) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        let marked = self.repo.mark_all_read(&mut conn, user_id, conversation_id).await?;
        tracing::debug!(marked, "Messages marked as read");
        Ok(marked)
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_mark_all_messages_as_read(&self, user_id: i64, conversation_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.members.is_member(&mut conn, conversation_id, user_id).await
    }

    /// A window of the conversation as seen by `user_id`, with profiles of the senders in it.
    /// When the window holds no messages, the profiles of all members are returned instead.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, query), fields(limit_from = query.limit_from, limit_num = query.limit_num))]
    pub async fn get_conversation_messages(
        &self,
        user_id: i64,
        conversation_id: i64,
        query: &MessageQuery,
    ) -> Result<ConversationMessages> {
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_id(&mut conn, conversation_id).await?.ok_or(AppError::NotFound)?;

        let messages = self.repo.find_for_conversation(&mut conn, user_id, conversation_id, query).await?;

        // An empty window still describes who is in the conversation.
        let users = if messages.is_empty() {
            self.members.find_members(&mut conn, conversation_id, 0, None).await?
        } else {
            let mut sender_ids: Vec<i64> = messages.iter().map(|m| m.user_id_from).collect();
            sender_ids.sort_unstable();
            sender_ids.dedup();
            self.directory.find_users(&mut conn, &sender_ids).await?
        };
        let members = users.iter().map(MemberProfile::from).collect();

        Ok(ConversationMessages { id: conversation_id, members, messages })
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_most_recent_conversation_message(
        &self,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Option<Message>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_most_recent(&mut conn, conversation_id, user_id).await
    }

    /// Number of conversations holding at least one message the user has not read.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn count_unread_conversations(&self, user_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.count_unread_conversations(&mut conn, user_id).await
    }

    /// Next messages after `cursor` in `(xact_id, id)` order, for the search indexer. Messages
    /// from transactions that may still be running are held back until they settle.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn fetch_index_batch(&self, cursor: Option<IndexCursor>, limit: i64) -> Result<Vec<IndexableMessage>> {
        let mut conn = self.pool.acquire().await?;
        let batch = self.repo.fetch_index_batch(&mut conn, cursor, limit.max(1)).await?;
        self.metrics.index_batch_size.record(batch.len() as u64, &[]);
        Ok(batch)
    }
}
