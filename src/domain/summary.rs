use crate::domain::conversation::ConversationType;
use crate::domain::message::Message;
use crate::domain::user::{MemberInfo, MemberProfile};
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// One entry of a user's conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub name: Option<String>,
    /// Name of the linked entity, for group conversations bound to an area.
    pub subname: Option<String>,
    pub image_url: Option<String>,
    pub r#type: ConversationType,
    pub member_count: i64,
    pub is_muted: bool,
    pub is_favourite: bool,
    pub is_read: bool,
    /// `None` when nothing is unread.
    pub unread_count: Option<i64>,
    pub members: Vec<MemberProfile>,
    /// Latest visible message, or empty.
    pub messages: Vec<Message>,
}

/// A single conversation opened by one of its members.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub id: i64,
    pub name: Option<String>,
    pub subname: Option<String>,
    pub image_url: Option<String>,
    pub r#type: ConversationType,
    pub member_count: i64,
    pub is_muted: bool,
    pub is_favourite: bool,
    pub is_read: bool,
    pub unread_count: Option<i64>,
    pub members: Vec<MemberInfo>,
    pub messages: Vec<Message>,
    pub can_delete_messages_for_all_users: bool,
}

/// Which parts of a conversation to load alongside its state.
#[derive(Debug, Clone, Copy)]
pub struct DetailOptions {
    pub include_contact_requests: bool,
    pub include_privacy_info: bool,
    pub member_offset: i64,
    pub member_limit: i64,
    pub message_offset: i64,
    pub message_limit: i64,
    pub newest_messages_first: bool,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            include_contact_requests: false,
            include_privacy_info: false,
            member_offset: 0,
            member_limit: 0,
            message_offset: 0,
            message_limit: 100,
            newest_messages_first: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub individual: i64,
    pub group: i64,
    #[serde(rename = "self")]
    pub self_: i64,
}

impl TypeCounts {
    #[must_use]
    pub const fn get(&self, r#type: ConversationType) -> i64 {
        match r#type {
            ConversationType::Individual => self.individual,
            ConversationType::Group => self.group,
            ConversationType::SelfConversation => self.self_,
        }
    }

    fn add(&mut self, r#type: ConversationType, total: i64) {
        match r#type {
            ConversationType::Individual => self.individual += total,
            ConversationType::Group => self.group += total,
            ConversationType::SelfConversation => self.self_ += total,
        }
    }
}

/// Conversation counts as shown in the list headers. Every conversation is counted under
/// its type; starred ones are also counted in `favourites`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationCounts {
    pub favourites: i64,
    pub types: TypeCounts,
}

impl ConversationCounts {
    pub fn record(&mut self, r#type: ConversationType, is_favourite: bool, total: i64) {
        if is_favourite {
            self.favourites += total;
        }
        self.types.add(r#type, total);
    }
}

/// Latest message matching a search in one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSearchResult {
    pub message_id: i64,
    pub conversation_id: i64,
    pub conversation_type: ConversationType,
    pub conversation_name: Option<String>,
    pub user_id_from: i64,
    pub from_full_name: String,
    /// For individual conversations, the member that is not the searcher.
    pub other_user_id: Option<i64>,
    pub small_message: String,
    pub is_blocked: bool,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
}

/// Conversation shared between the searcher and a found user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedConversation {
    pub id: i64,
    pub r#type: ConversationType,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSearchResult {
    pub id: i64,
    pub full_name: String,
    pub is_blocked: bool,
    pub conversations: BTreeMap<i64, SharedConversation>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserSearchResults {
    pub contacts: Vec<UserSearchResult>,
    pub noncontacts: Vec<UserSearchResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_favourites_are_counted_by_type_and_in_total() {
        let mut counts = ConversationCounts::default();
        counts.record(ConversationType::Individual, false, 3);
        counts.record(ConversationType::Individual, true, 2);
        counts.record(ConversationType::Group, false, 1);
        counts.record(ConversationType::SelfConversation, true, 1);

        assert_eq!(counts.favourites, 3);
        assert_eq!(counts.types, TypeCounts { individual: 5, group: 1, self_: 1 });
        assert_eq!(counts.types.get(ConversationType::Group), 1);
    }

    #[test]
    fn test_type_counts_serialize_self_key() {
        let json = serde_json::to_value(TypeCounts { individual: 1, group: 2, self_: 3 }).expect("counts serialize");
        assert_eq!(json["self"], 3);
    }
}
