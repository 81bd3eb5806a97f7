use crate::adapters::database::DbPool;
use crate::adapters::database::conversation_repo::{ConversationFilter, ConversationRepository, into_conversation};
use crate::adapters::database::directory_repo::DirectoryRepository;
use crate::adapters::database::member_repo::MemberRepository;
use crate::adapters::database::message_repo::MessageRepository;
use crate::adapters::database::records::{ConversationListRecord, MessageSearchRecord};
use crate::config::MessagingConfig;
use crate::domain::capability::{Capability, Scope};
use crate::domain::conversation::{Conversation, ConversationType};
use crate::domain::message::{Message, MessageFormat, MessageQuery, SortOrder};
use crate::domain::summary::{
    ConversationCounts, ConversationDetail, ConversationSummary, DetailOptions, MessageSearchResult,
    SharedConversation, UserSearchResult, UserSearchResults,
};
use crate::domain::user::{MemberInfo, MemberProfile, User, full_name};
use crate::error::{AppError, Result};
use crate::services::access::AccessOracle;
use crate::services::area::{AreaDetails, AreaResolver};
use crate::services::contact_service::ContactService;
use crate::services::conversation_service::conversation_type;
use crate::services::privacy_service::PrivacyService;
use crate::services::{bounded_page_limit, page_limit};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Read-side views that combine conversations, messages, members and per-user state.
#[derive(Clone, Debug)]
pub struct AggregationService {
    pool: DbPool,
    conversations: ConversationRepository,
    members: MemberRepository,
    messages: MessageRepository,
    directory: DirectoryRepository,
    contacts: ContactService,
    privacy: PrivacyService,
    oracle: Arc<dyn AccessOracle>,
    areas: Arc<dyn AreaResolver>,
    config: MessagingConfig,
}

impl AggregationService {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        pool: DbPool,
        conversations: ConversationRepository,
        members: MemberRepository,
        messages: MessageRepository,
        directory: DirectoryRepository,
        contacts: ContactService,
        privacy: PrivacyService,
        oracle: Arc<dyn AccessOracle>,
        areas: Arc<dyn AreaResolver>,
        config: MessagingConfig,
    ) -> Self {
        Self { pool, conversations, members, messages, directory, contacts, privacy, oracle, areas, config }
    }

    /// The user's conversation list.
    ///
    /// Conversations with a visible message come first, newest message first; empty ones
    /// follow, newest conversation first. Pagination applies to the merged list, and a
    /// `limit_num` of zero lists everything.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` for an unknown type code.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversations(
        &self,
        user_id: i64,
        limit_from: i64,
        limit_num: i64,
        r#type: Option<i32>,
        favourites: Option<bool>,
    ) -> Result<Vec<ConversationSummary>> {
        let filter = ConversationFilter { r#type: r#type.map(conversation_type).transpose()?, favourites };
        let limit = page_limit(limit_num);

        let mut conn = self.pool.acquire().await?;
        let records = self.conversations.find_for_user(&mut conn, user_id, filter, None, limit_from.max(0), limit).await?;

        let ids: Vec<i64> = records.iter().map(|r| r.conversation.id).collect();
        let mut previews: HashMap<i64, Vec<MemberProfile>> = HashMap::new();
        for (conversation_id, user) in
            self.members.find_previews(&mut conn, &ids, user_id, self.config.member_preview_limit).await?
        {
            previews.entry(conversation_id).or_default().push(MemberProfile::from(&user));
        }
        drop(conn);

        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            let listed = Listed::try_from(record)?;
            let area = self.area_details(&listed.conversation).await?;
            let members = previews.remove(&listed.conversation.id).unwrap_or_default();
            summaries.push(listed.into_summary(area, members));
        }
        Ok(summaries)
    }

    /// A single conversation with a page of members and a page of messages.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation does not exist, is disabled, or the user
    /// is not a member.
    #[tracing::instrument(err(level = "warn"), skip(self, options))]
    pub async fn get_conversation(
        &self,
        user_id: i64,
        conversation_id: i64,
        options: DetailOptions,
    ) -> Result<ConversationDetail> {
        let mut conn = self.pool.acquire().await?;
        let record = self
            .conversations
            .find_for_user(&mut conn, user_id, ConversationFilter::default(), Some(conversation_id), 0, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?;

        let member_ids: Vec<i64> = self
            .members
            .find_members(&mut conn, conversation_id, options.member_offset.max(0), page_limit(options.member_limit))
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        let sort = if options.newest_messages_first { SortOrder::TimeCreatedDesc } else { SortOrder::TimeCreatedAsc };
        let query = MessageQuery::page(options.message_offset.max(0), options.message_limit.max(0)).sorted(sort);
        let messages = self.messages.find_for_conversation(&mut conn, user_id, conversation_id, &query).await?;
        drop(conn);

        let listed = Listed::try_from(record)?;
        let area = self.area_details(&listed.conversation).await?;
        let members = self
            .get_member_info(user_id, &member_ids, options.include_contact_requests, options.include_privacy_info)
            .await?;

        let can_delete_messages_for_all_users = listed.conversation.r#type == ConversationType::Group
            && self.oracle.has_capability(user_id, Capability::DeleteAnyMessage, Scope::System).await?;

        let summary = listed.into_summary(area, Vec::new());
        Ok(ConversationDetail {
            id: summary.id,
            name: summary.name,
            subname: summary.subname,
            image_url: summary.image_url,
            r#type: summary.r#type,
            member_count: summary.member_count,
            is_muted: summary.is_muted,
            is_favourite: summary.is_favourite,
            is_read: summary.is_read,
            unread_count: summary.unread_count,
            members,
            messages,
            can_delete_messages_for_all_users,
        })
    }

    /// Counts matching what [`AggregationService::get_conversations`] lists.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_conversation_counts(&self, user_id: i64) -> Result<ConversationCounts> {
        self.counts(user_id, false).await
    }

    /// Like [`AggregationService::get_conversation_counts`], restricted to conversations
    /// holding unread messages.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_unread_conversation_counts(&self, user_id: i64) -> Result<ConversationCounts> {
        self.counts(user_id, true).await
    }

    async fn counts(&self, user_id: i64, unread_only: bool) -> Result<ConversationCounts> {
        let mut conn = self.pool.acquire().await?;
        let records = self.conversations.count_for_user(&mut conn, user_id, unread_only).await?;

        let mut counts = ConversationCounts::default();
        for record in records {
            let r#type = ConversationType::try_from(record.conversation_type).map_err(|e| {
                tracing::error!(error = %e, "Database data corruption: invalid conversation type");
                AppError::Internal
            })?;
            counts.record(r#type, record.is_favourite, record.total);
        }
        Ok(counts)
    }

    /// Most recent matching message per conversation, newest match first. Messages from
    /// blocked users are kept and flagged.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self, query))]
    pub async fn search_messages(
        &self,
        user_id: i64,
        query: &str,
        limit_from: i64,
        limit_num: i64,
    ) -> Result<Vec<MessageSearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.pool.acquire().await?;
        let records = self
            .messages
            .search(
                &mut conn,
                user_id,
                query,
                limit_from.max(0),
                Some(bounded_page_limit(limit_num, self.config.page_limit_max)),
            )
            .await?;

        records.into_iter().map(into_search_result).collect()
    }

    /// Contacts and viewable non-contacts whose name or username contains `query`, each with
    /// the conversations the requester shares with them.
    ///
    /// # Errors
    /// Returns `AppError::InvalidState` if messaging is disabled.
    #[tracing::instrument(err(level = "warn"), skip(self, query))]
    pub async fn message_search_users(
        &self,
        user_id: i64,
        query: &str,
        limit_from: i64,
        limit_num: i64,
    ) -> Result<UserSearchResults> {
        if !self.config.enabled {
            return Err(AppError::InvalidState("Messaging is disabled".into()));
        }

        let query = query.trim();
        let limit_from = limit_from.max(0);
        let limit = Some(bounded_page_limit(limit_num, self.config.page_limit_max));

        let everyone_visible = self.config.allow_all_users
            || self.oracle.has_capability(user_id, Capability::ViewAllProfiles, Scope::System).await?;

        let mut conn = self.pool.acquire().await?;
        let contacts = self.directory.search_contacts(&mut conn, user_id, query, limit_from, limit).await?;
        let noncontacts = self
            .directory
            .search_noncontacts(&mut conn, user_id, query, everyone_visible, limit_from, limit)
            .await?;

        let found: Vec<i64> = contacts.iter().chain(&noncontacts).map(|u| u.id).collect();
        let mut shared: HashMap<i64, BTreeMap<i64, SharedConversation>> = HashMap::new();
        for record in self.conversations.find_shared_with(&mut conn, user_id, &found).await? {
            let r#type = ConversationType::try_from(record.conversation_type).map_err(|e| {
                tracing::error!(error = %e, "Database data corruption: invalid conversation type");
                AppError::Internal
            })?;
            shared
                .entry(record.other_user_id)
                .or_default()
                .insert(record.id, SharedConversation { id: record.id, r#type, name: record.name });
        }
        drop(conn);

        let blocked: HashSet<i64> = self.contacts.blocked_ids_among(user_id, &found).await?.into_iter().collect();

        let to_result = |user: User| UserSearchResult {
            id: user.id,
            full_name: user.full_name(),
            is_blocked: blocked.contains(&user.id),
            conversations: shared.get(&user.id).cloned().unwrap_or_default(),
        };

        Ok(UserSearchResults {
            contacts: contacts.into_iter().map(to_result).collect(),
            noncontacts: noncontacts.into_iter().map(to_result).collect(),
        })
    }

    /// Describes `user_ids` from the point of view of `reference_user_id`, in the order given.
    /// Unknown ids are skipped.
    ///
    /// # Errors
    /// Returns `AppError::Database` if a lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self, user_ids), fields(count = user_ids.len()))]
    pub async fn get_member_info(
        &self,
        reference_user_id: i64,
        user_ids: &[i64],
        include_contact_requests: bool,
        include_privacy_info: bool,
    ) -> Result<Vec<MemberInfo>> {
        let users: HashMap<i64, User> = {
            let mut conn = self.pool.acquire().await?;
            self.directory.find_users(&mut conn, user_ids).await?.into_iter().map(|u| (u.id, u)).collect()
        };
        let ids: Vec<i64> = users.keys().copied().collect();
        let contacts: HashSet<i64> =
            self.contacts.contact_ids_among(reference_user_id, &ids).await?.into_iter().collect();
        let blocked: HashSet<i64> =
            self.contacts.blocked_ids_among(reference_user_id, &ids).await?.into_iter().collect();

        let mut seen = HashSet::new();
        let mut infos = Vec::with_capacity(users.len());
        for id in user_ids.iter().copied().filter(|id| seen.insert(*id)) {
            let Some(user) = users.get(&id) else {
                continue;
            };

            let (can_message, requires_contact) = if include_privacy_info && id != reference_user_id {
                let can = self.privacy.can_send_message(reference_user_id, id, false).await?;
                let preference = self.privacy.get_user_privacy_messaging_preference(id).await?;
                (Some(can), Some(preference.requires_contact()))
            } else if include_privacy_info {
                (Some(true), Some(false))
            } else {
                (None, None)
            };

            let contact_requests = if include_contact_requests {
                Some(self.contacts.get_contact_requests_between_users(reference_user_id, id).await?)
            } else {
                None
            };

            infos.push(MemberInfo {
                id,
                full_name: user.full_name(),
                is_contact: contacts.contains(&id),
                is_blocked: blocked.contains(&id),
                is_deleted: user.deleted,
                can_message,
                requires_contact,
                contact_requests,
            });
        }
        Ok(infos)
    }

    async fn area_details(&self, conversation: &Conversation) -> Result<AreaDetails> {
        match (&conversation.area, conversation.r#type) {
            (Some(area), ConversationType::Group) => Ok(self.areas.resolve(area).await?.unwrap_or_default()),
            _ => Ok(AreaDetails::default()),
        }
    }
}

/// A listing row converted into domain values.
struct Listed {
    conversation: Conversation,
    is_favourite: bool,
    is_muted: bool,
    member_count: i64,
    unread_count: i64,
    last_message: Option<Message>,
}

impl Listed {
    fn into_summary(self, area: AreaDetails, members: Vec<MemberProfile>) -> ConversationSummary {
        ConversationSummary {
            id: self.conversation.id,
            name: self.conversation.name,
            subname: area.subname,
            image_url: area.image_url,
            r#type: self.conversation.r#type,
            member_count: self.member_count,
            is_muted: self.is_muted,
            is_favourite: self.is_favourite,
            is_read: self.unread_count == 0,
            unread_count: (self.unread_count > 0).then_some(self.unread_count),
            members,
            messages: self.last_message.into_iter().collect(),
        }
    }
}

impl TryFrom<ConversationListRecord> for Listed {
    type Error = AppError;

    fn try_from(record: ConversationListRecord) -> Result<Self> {
        let conversation_id = record.conversation.id;
        let last_message = match (
            record.last_message_id,
            record.last_user_id_from,
            record.last_full_message,
            record.last_full_message_format,
            record.last_time_created,
        ) {
            (Some(id), Some(user_id_from), Some(full_message), Some(format), Some(time_created)) => Some(Message {
                id,
                conversation_id,
                user_id_from,
                subject: record.last_subject,
                full_message,
                full_message_format: MessageFormat::try_from(format).map_err(|e| {
                    tracing::error!(error = %e, "Database data corruption: invalid message format");
                    AppError::Internal
                })?,
                small_message: record.last_small_message.unwrap_or_default(),
                time_created,
            }),
            _ => None,
        };

        Ok(Self {
            conversation: into_conversation(record.conversation)?,
            is_favourite: record.is_favourite,
            is_muted: record.is_muted,
            member_count: record.member_count,
            unread_count: record.unread_count,
            last_message,
        })
    }
}

fn into_search_result(record: MessageSearchRecord) -> Result<MessageSearchResult> {
    let conversation_type = ConversationType::try_from(record.conversation_type).map_err(|e| {
        tracing::error!(error = %e, "Database data corruption: invalid conversation type");
        AppError::Internal
    })?;
    Ok(MessageSearchResult {
        message_id: record.id,
        conversation_id: record.conversation_id,
        conversation_type,
        conversation_name: record.conversation_name,
        user_id_from: record.user_id_from,
        from_full_name: full_name(&record.from_first_name, &record.from_last_name),
        other_user_id: record.other_user_id,
        small_message: record.small_message,
        is_blocked: record.is_blocked,
        time_created: record.time_created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::records::ConversationRecord;
    use time::OffsetDateTime;

    fn list_record(unread_count: i64, last_message_id: Option<i64>) -> ConversationListRecord {
        ConversationListRecord {
            conversation: ConversationRecord {
                id: 9,
                conversation_type: 2,
                name: Some("Study group".into()),
                conv_hash: None,
                enabled: true,
                component: None,
                item_type: None,
                item_id: None,
                context_id: None,
                time_created: OffsetDateTime::UNIX_EPOCH,
                time_modified: OffsetDateTime::UNIX_EPOCH,
            },
            is_favourite: true,
            is_muted: false,
            member_count: 3,
            unread_count,
            last_message_id,
            last_user_id_from: last_message_id.map(|_| 4),
            last_subject: None,
            last_full_message: last_message_id.map(|_| "<p>hello</p>".to_string()),
            last_full_message_format: last_message_id.map(|_| 1),
            last_small_message: last_message_id.map(|_| "hello".to_string()),
            last_time_created: last_message_id.map(|_| OffsetDateTime::UNIX_EPOCH),
        }
    }

    #[test]
    fn test_summary_hides_zero_unread_count() {
        let summary = Listed::try_from(list_record(0, Some(1))).expect("valid record").into_summary(
            AreaDetails::default(),
            Vec::new(),
        );
        assert!(summary.is_read);
        assert_eq!(summary.unread_count, None);
        assert_eq!(summary.messages.len(), 1);
        assert_eq!(summary.messages[0].conversation_id, 9);
        assert_eq!(summary.messages[0].full_message_format, MessageFormat::Html);
    }

    #[test]
    fn test_summary_reports_unread_and_empty_conversations() {
        let area = AreaDetails { subname: Some("Course".into()), image_url: None };
        let summary = Listed::try_from(list_record(4, None)).expect("valid record").into_summary(area, Vec::new());
        assert!(!summary.is_read);
        assert_eq!(summary.unread_count, Some(4));
        assert!(summary.messages.is_empty());
        assert_eq!(summary.subname.as_deref(), Some("Course"));
    }

    #[test]
    fn test_corrupt_format_is_internal() {
        let mut record = list_record(0, Some(1));
        record.last_full_message_format = Some(3);
        assert!(matches!(Listed::try_from(record), Err(AppError::Internal)));
    }
}
