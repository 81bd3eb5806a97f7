use crate::adapters::database::DbPool;
use crate::adapters::database::conversation_action_repo::ConversationActionRepository;
use crate::adapters::database::conversation_repo::ConversationRepository;
use crate::adapters::database::member_repo::MemberRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::config::MessagingConfig;
use crate::domain::capability::{Capability, Scope};
use crate::domain::conversation::{
    Conversation, ConversationAction, ConversationActionRecord, ConversationArea, ConversationHash, ConversationType,
    NewConversation, conversation_hash,
};
use crate::domain::favourite::{CONVERSATION_FAVOURITES, Favourite};
use crate::error::{AppError, Result};
use crate::services::access::AccessOracle;
use crate::services::favourite_service::FavouriteService;
use crate::services::page_limit;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    created_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("colloquy");
        Self {
            created_total: meter
                .u64_counter("colloquy_conversations_created_total")
                .with_description("Total conversations created")
                .build(),
        }
    }
}

/// Parses a stored or caller-supplied conversation type code.
///
/// # Errors
/// Returns `AppError::InvalidArgument` for an unknown code.
pub fn conversation_type(code: i32) -> Result<ConversationType> {
    ConversationType::try_from(code).map_err(AppError::InvalidArgument)
}

#[derive(Clone, Debug)]
pub struct ConversationService {
    pool: DbPool,
    conversations: ConversationRepository,
    members: MemberRepository,
    actions: ConversationActionRepository,
    messages: MessageRepository,
    favourites: FavouriteService,
    oracle: Arc<dyn AccessOracle>,
    config: MessagingConfig,
    metrics: Metrics,
}

impl ConversationService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        pool: DbPool,
        conversations: ConversationRepository,
        members: MemberRepository,
        actions: ConversationActionRepository,
        messages: MessageRepository,
        favourites: FavouriteService,
        oracle: Arc<dyn AccessOracle>,
        config: MessagingConfig,
    ) -> Self {
        Self { pool, conversations, members, actions, messages, favourites, oracle, config, metrics: Metrics::new() }
    }

    /// Creates a conversation with its members.
    ///
    /// Individual and self conversations are deduplicated by participant set: when one
    /// already exists, it is returned instead.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` for a wrong member count or a group without a name or area.
    /// Returns `AppError::NotFound` if a participant of an individual or self conversation does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, params),
        fields(conversation_type = %params.r#type, members = params.user_ids.len())
    )]
    pub async fn create_conversation(&self, params: NewConversation) -> Result<Conversation> {
        self.create_or_fetch(params).await.map(|(conversation, _)| conversation)
    }

    async fn create_or_fetch(&self, params: NewConversation) -> Result<(Conversation, bool)> {
        let user_ids = params.distinct_user_ids();

        if let Some(required) = params.r#type.required_members()
            && user_ids.len() != required
        {
            return Err(AppError::InvalidArgument(format!(
                "A {} conversation needs exactly {required} distinct members",
                params.r#type
            )));
        }

        if params.r#type == ConversationType::Group
            && params.area.is_none()
            && params.name.as_deref().is_none_or(|n| n.trim().is_empty())
        {
            return Err(AppError::InvalidArgument("A group conversation needs a name".into()));
        }

        let hash = params.r#type.is_hashed().then(|| conversation_hash(&user_ids));

        if let Some(hash) = &hash {
            let mut conn = self.pool.acquire().await?;
            if let Some(existing) = self.conversations.find_by_hash(&mut conn, hash).await? {
                return Ok((existing, false));
            }
        }

        let mut tx = self.pool.begin().await?;

        let conversation = match self.conversations.create(&mut tx, &params, hash.as_ref()).await {
            Ok(conversation) => conversation,
            Err(e) if e.is_unique_violation() => {
                drop(tx);
                tracing::debug!("Lost conversation creation race, fetching the winner");
                return self.fetch_by_hash(hash.as_ref()).await.map(|c| (c, false));
            }
            Err(e) => return Err(e),
        };

        let added = self.members.add(&mut tx, conversation.id, &user_ids).await?;
        if params.r#type.is_hashed() && usize::try_from(added).ok() != Some(user_ids.len()) {
            // Dropping the transaction rolls back the half-built conversation.
            return Err(AppError::NotFound);
        }

        tx.commit().await?;

        self.metrics.created_total.add(1, &[KeyValue::new("type", params.r#type.to_string())]);
        tracing::info!(conversation_id = conversation.id, "Conversation created");
        Ok((conversation, true))
    }

    async fn fetch_by_hash(&self, hash: Option<&ConversationHash>) -> Result<Conversation> {
        let hash = hash.ok_or(AppError::Internal)?;
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_hash(&mut conn, hash).await?.ok_or(AppError::Internal)
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation> {
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_id(&mut conn, conversation_id).await?.ok_or(AppError::NotFound)
    }

    /// The individual conversation between exactly these users, if one was created.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation_between_users(&self, user_ids: &[i64]) -> Result<Option<Conversation>> {
        let mut ids = user_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() < 2 {
            return Ok(None);
        }

        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_hash(&mut conn, &conversation_hash(&ids)).await
    }

    /// Enabled group conversations both users belong to, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversations_between_users(
        &self,
        user_id: i64,
        other_id: i64,
        limit_from: i64,
        limit_num: i64,
    ) -> Result<Vec<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        self.conversations
            .find_groups_between(&mut conn, user_id, other_id, limit_from.max(0), page_limit(limit_num))
            .await
    }

    /// Returns the user's self conversation, creating it on first use.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the user does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_self_conversation(&self, user_id: i64) -> Result<Conversation> {
        let params = NewConversation::new(ConversationType::SelfConversation, vec![user_id]);
        let (conversation, created) = self.create_or_fetch(params).await?;

        if created && self.config.self_conversation_favourite {
            self.favourites.set_favourite(CONVERSATION_FAVOURITES, conversation.id, user_id, None).await?;
        }
        Ok(conversation)
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self, area), fields(component = %area.component, item_id = area.item_id))]
    pub async fn get_conversation_by_area(&self, area: &ConversationArea) -> Result<Option<Conversation>> {
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_area(&mut conn, area).await
    }

    /// Whether a conversation is linked to the area and enabled.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self, area), fields(component = %area.component, item_id = area.item_id))]
    pub async fn is_conversation_area_enabled(&self, area: &ConversationArea) -> Result<bool> {
        Ok(self.get_conversation_by_area(area).await?.is_some_and(|c| c.enabled))
    }

    /// Adds users to a group conversation. Existing members and unknown users are skipped.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::InvalidState` if it is not a group conversation.
    #[tracing::instrument(err(level = "warn"), skip(self, user_ids), fields(count = user_ids.len()))]
    pub async fn add_members_to_conversation(&self, user_ids: &[i64], conversation_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.require_group(&mut tx, conversation_id).await?;

        let added = match self.members.add(&mut tx, conversation_id, user_ids).await {
            Ok(added) => added,
            Err(e) if e.is_foreign_key_violation() => return Err(AppError::NotFound),
            Err(e) => return Err(e),
        };

        tx.commit().await?;
        tracing::debug!(added, "Members added");
        Ok(())
    }

    /// Removes users from a group conversation. Non-members are skipped.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::InvalidState` if it is not a group conversation.
    #[tracing::instrument(err(level = "warn"), skip(self, user_ids), fields(count = user_ids.len()))]
    pub async fn remove_members_from_conversation(&self, user_ids: &[i64], conversation_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.require_group(&mut tx, conversation_id).await?;

        let removed = self.members.remove(&mut tx, conversation_id, user_ids).await?;

        tx.commit().await?;
        tracing::debug!(removed, "Members removed");
        Ok(())
    }

    async fn require_group(&self, conn: &mut sqlx::PgConnection, conversation_id: i64) -> Result<Conversation> {
        let conversation = self.conversations.find_by_id(conn, conversation_id).await?.ok_or(AppError::NotFound)?;
        match conversation.r#type {
            ConversationType::Group => Ok(conversation),
            ConversationType::Individual | ConversationType::SelfConversation => Err(AppError::InvalidState(
                format!("Members of a {} conversation cannot be changed", conversation.r#type),
            )),
        }
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn is_user_in_conversation(&self, user_id: i64, conversation_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.members.is_member(&mut conn, conversation_id, user_id).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn count_conversation_members(&self, conversation_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.members.count(&mut conn, conversation_id).await
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn enable_conversation(&self, conversation_id: i64) -> Result<()> {
        self.set_enabled(conversation_id, true).await
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn disable_conversation(&self, conversation_id: i64) -> Result<()> {
        self.set_enabled(conversation_id, false).await
    }

    async fn set_enabled(&self, conversation_id: i64, enabled: bool) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.conversations.set_enabled(&mut conn, conversation_id, enabled).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self, name))]
    pub async fn update_conversation_name(&self, conversation_id: i64, name: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.conversations.update_name(&mut conn, conversation_id, name).await? {
            Ok(())
        } else {
            Err(AppError::NotFound)
        }
    }

    /// Stars a conversation for a member. Starring it again returns the same favourite.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::PermissionDenied` if the user is not a member.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn set_favourite_conversation(&self, conversation_id: i64, user_id: i64) -> Result<Favourite> {
        self.require_member(conversation_id, user_id).await?;
        self.favourites.set_favourite(CONVERSATION_FAVOURITES, conversation_id, user_id, None).await
    }

    /// Unstars a conversation.
    ///
    /// # Errors
    /// Returns `AppError::InvalidState` if the conversation is not starred by the user.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn unset_favourite_conversation(&self, conversation_id: i64, user_id: i64) -> Result<()> {
        self.favourites.unset_favourite(CONVERSATION_FAVOURITES, conversation_id, user_id).await
    }

    /// Mutes a conversation for a member. Muting again returns the existing action.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    /// Returns `AppError::PermissionDenied` if the user is not a member.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mute_conversation(&self, user_id: i64, conversation_id: i64) -> Result<ConversationActionRecord> {
        self.require_member(conversation_id, user_id).await?;
        let mut conn = self.pool.acquire().await?;
        self.actions.set(&mut conn, user_id, conversation_id, ConversationAction::Muted).await
    }

    /// # Errors
    /// Returns `AppError::InvalidState` if the conversation is not muted by the user.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn unmute_conversation(&self, user_id: i64, conversation_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.actions.unset(&mut conn, user_id, conversation_id, ConversationAction::Muted).await? {
            Ok(())
        } else {
            Err(AppError::InvalidState("Conversation is not muted".into()))
        }
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn is_conversation_muted(&self, user_id: i64, conversation_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.actions.exists(&mut conn, user_id, conversation_id, ConversationAction::Muted).await
    }

    /// Hard-deletes a conversation and everything that references it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if any deletion fails; nothing is deleted in that case.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_all_conversation_data(&self, conversation_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let actions = self.messages.delete_actions_for_conversation(&mut tx, conversation_id).await?;
        let messages = self.messages.delete_for_conversation(&mut tx, conversation_id).await?;
        self.actions.delete_for_conversation(&mut tx, conversation_id).await?;
        self.favourites.delete_for_item_with(&mut tx, CONVERSATION_FAVOURITES, conversation_id).await?;
        self.members.remove_all(&mut tx, conversation_id).await?;
        let deleted = self.conversations.delete(&mut tx, conversation_id).await?;

        tx.commit().await?;
        tracing::info!(deleted, messages, actions, "Conversation data deleted");
        Ok(())
    }

    /// Hides every message of a conversation from one user. Other members are unaffected.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn delete_conversation_by_id(&self, user_id: i64, conversation_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_id(&mut conn, conversation_id).await?.ok_or(AppError::NotFound)?;
        let hidden = self.messages.delete_conversation_for_user(&mut conn, user_id, conversation_id).await?;
        tracing::debug!(hidden, "Conversation deleted for user");
        Ok(())
    }

    /// Members may delete their view of a conversation; so may holders of the delete-any capability.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_delete_conversation(&self, user_id: i64, conversation_id: i64) -> Result<bool> {
        if self.is_user_in_conversation(user_id, conversation_id).await? {
            return Ok(true);
        }
        self.oracle.has_capability(user_id, Capability::DeleteAnyMessage, Scope::System).await
    }

    async fn require_member(&self, conversation_id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.conversations.find_by_id(&mut conn, conversation_id).await?.ok_or(AppError::NotFound)?;
        if self.members.is_member(&mut conn, conversation_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::PermissionDenied("User is not a member of the conversation".into()))
        }
    }
}
