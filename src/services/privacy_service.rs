use crate::adapters::database::DbPool;
use crate::adapters::database::contact_repo::ContactRepository;
use crate::adapters::database::conversation_repo::ConversationRepository;
use crate::adapters::database::member_repo::MemberRepository;
use crate::adapters::database::preference_repo::PreferenceRepository;
use crate::config::MessagingConfig;
use crate::domain::capability::{Capability, Scope};
use crate::domain::conversation::ConversationType;
use crate::domain::privacy::{PRIVACY_PREFERENCE_NAME, PrivacyPreference};
use crate::error::{AppError, Result};
use crate::services::access::AccessOracle;
use std::sync::Arc;

/// Decides who may message whom.
#[derive(Clone, Debug)]
pub struct PrivacyService {
    pool: DbPool,
    oracle: Arc<dyn AccessOracle>,
    contacts: ContactRepository,
    preferences: PreferenceRepository,
    conversations: ConversationRepository,
    members: MemberRepository,
    config: MessagingConfig,
}

impl PrivacyService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        oracle: Arc<dyn AccessOracle>,
        contacts: ContactRepository,
        preferences: PreferenceRepository,
        conversations: ConversationRepository,
        members: MemberRepository,
        config: MessagingConfig,
    ) -> Self {
        Self { pool, oracle, contacts, preferences, conversations, members, config }
    }

    /// Whether `user_id_from` may start or continue an individual conversation with `user_id_to`.
    ///
    /// Rules apply in order: the send capability is required and the recipient must exist; a block by the recipient
    /// refuses the sender unless `even_if_blocked` or the sender may message anyone; a sender
    /// who may message anyone, or is messaging themselves, is allowed; otherwise the
    /// recipient's privacy preference decides.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_send_message(&self, user_id_from: i64, user_id_to: i64, even_if_blocked: bool) -> Result<bool> {
        if !self.oracle.has_capability(user_id_from, Capability::SendMessage, Scope::System).await? {
            return Ok(false);
        }
        // Deleted or unknown recipients cannot be reached by anyone.
        if !self.oracle.user_exists(user_id_to).await? {
            return Ok(false);
        }

        let message_any_user = self.oracle.has_capability(user_id_from, Capability::MessageAnyUser, Scope::System).await?;

        if !even_if_blocked && !message_any_user {
            let mut conn = self.pool.acquire().await?;
            if self.contacts.is_blocked(&mut conn, user_id_to, user_id_from).await? {
                return Ok(false);
            }
        }

        if message_any_user || user_id_from == user_id_to {
            return Ok(true);
        }

        let preference = self.get_user_privacy_messaging_preference(user_id_to).await?;
        let is_contact = {
            let mut conn = self.pool.acquire().await?;
            self.contacts.find_contact(&mut conn, user_id_from, user_id_to).await?.is_some()
        };

        // Enrolments only matter for course-member preferences, and only for non-contacts.
        let shares_course = preference == PrivacyPreference::CourseMember
            && !is_contact
            && self.oracle.shares_course(user_id_from, user_id_to).await?;

        Ok(preference.permits(is_contact, shares_course))
    }

    /// Whether `user_id_from` may post in a conversation. Non-members never may.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_send_message_to_conversation(&self, user_id_from: i64, conversation_id: i64) -> Result<bool> {
        let (conversation, member_ids) = {
            let mut conn = self.pool.acquire().await?;
            let Some(conversation) = self.conversations.find_by_id(&mut conn, conversation_id).await? else {
                return Ok(false);
            };
            let member_ids = self.members.find_member_ids(&mut conn, conversation_id).await?;
            (conversation, member_ids)
        };

        if !member_ids.contains(&user_id_from) {
            return Ok(false);
        }

        match conversation.r#type {
            ConversationType::Individual => {
                let Some(&other) = member_ids.iter().find(|&&id| id != user_id_from) else {
                    return Ok(false);
                };
                self.can_send_message(user_id_from, other, false).await
            }
            ConversationType::Group => {
                if !conversation.enabled {
                    return Ok(false);
                }
                self.oracle.has_capability(user_id_from, Capability::SendMessage, Scope::System).await
            }
            ConversationType::SelfConversation => {
                self.oracle.has_capability(user_id_from, Capability::SendMessage, Scope::System).await
            }
        }
    }

    /// Whether `user_id` may send a contact request to `requested_user_id`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_create_contact(&self, user_id: i64, requested_user_id: i64) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        if self.config.allow_all_users {
            return Ok(true);
        }
        self.oracle.shares_course(user_id, requested_user_id).await
    }

    /// Whether `user_id` may create group conversations in a course.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn can_create_group_conversation(&self, user_id: i64, course_id: i64) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        self.oracle.has_capability(user_id, Capability::CreateGroupConversations, Scope::Course(course_id)).await
    }

    /// The user's privacy preference as it currently applies.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_user_privacy_messaging_preference(&self, user_id: i64) -> Result<PrivacyPreference> {
        let mut conn = self.pool.acquire().await?;
        let stored = self.preferences.get(&mut conn, user_id, PRIVACY_PREFERENCE_NAME).await?;

        let preference = match stored {
            Some(raw) => raw.parse::<PrivacyPreference>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Ignoring invalid stored privacy preference");
                PrivacyPreference::default()
            }),
            None => PrivacyPreference::default(),
        };

        Ok(preference.effective(self.config.allow_all_users))
    }

    /// Stores the user's privacy preference.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` for `Site` while site-wide messaging is off.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn set_user_privacy_messaging_preference(
        &self,
        user_id: i64,
        preference: PrivacyPreference,
    ) -> Result<()> {
        if preference == PrivacyPreference::Site && !self.config.allow_all_users {
            return Err(AppError::InvalidArgument("Site-wide messaging is not enabled".into()));
        }

        let mut conn = self.pool.acquire().await?;
        self.preferences.set(&mut conn, user_id, PRIVACY_PREFERENCE_NAME, &preference.code().to_string()).await
    }
}
