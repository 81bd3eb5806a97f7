use crate::domain::conversation::{
    Conversation, ConversationAction, ConversationActionRecord, ConversationArea, ConversationType,
};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct ConversationRecord {
    pub(crate) id: i64,
    #[sqlx(rename = "type")]
    pub(crate) conversation_type: i32,
    pub(crate) name: Option<String>,
    pub(crate) conv_hash: Option<String>,
    pub(crate) enabled: bool,
    pub(crate) component: Option<String>,
    pub(crate) item_type: Option<String>,
    pub(crate) item_id: Option<i64>,
    pub(crate) context_id: Option<i64>,
    pub(crate) time_created: OffsetDateTime,
    pub(crate) time_modified: OffsetDateTime,
}

impl TryFrom<ConversationRecord> for Conversation {
    type Error = String;

    fn try_from(record: ConversationRecord) -> Result<Self, Self::Error> {
        let area = match (record.component, record.item_type, record.item_id, record.context_id) {
            (Some(component), Some(item_type), Some(item_id), Some(context_id)) => {
                Some(ConversationArea { component, item_type, item_id, context_id })
            }
            _ => None,
        };

        Ok(Self {
            id: record.id,
            r#type: ConversationType::try_from(record.conversation_type)?,
            name: record.name,
            hash: record.conv_hash.map(Into::into),
            enabled: record.enabled,
            area,
            time_created: record.time_created,
            time_modified: record.time_modified,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ConversationActionRow {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) conversation_id: i64,
    pub(crate) action: i32,
    pub(crate) time_created: OffsetDateTime,
}

impl TryFrom<ConversationActionRow> for ConversationActionRecord {
    type Error = String;

    fn try_from(row: ConversationActionRow) -> Result<Self, Self::Error> {
        let action = match row.action {
            1 => ConversationAction::Muted,
            other => return Err(format!("Unknown conversation action: {other}")),
        };
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            conversation_id: row.conversation_id,
            action,
            time_created: row.time_created,
        })
    }
}

/// One row of a user's conversation listing with its per-user state.
#[derive(Debug, sqlx::FromRow)]
pub struct ConversationListRecord {
    #[sqlx(flatten)]
    pub(crate) conversation: ConversationRecord,
    pub(crate) is_favourite: bool,
    pub(crate) is_muted: bool,
    pub(crate) member_count: i64,
    pub(crate) unread_count: i64,
    pub(crate) last_message_id: Option<i64>,
    pub(crate) last_user_id_from: Option<i64>,
    pub(crate) last_subject: Option<String>,
    pub(crate) last_full_message: Option<String>,
    pub(crate) last_full_message_format: Option<i32>,
    pub(crate) last_small_message: Option<String>,
    pub(crate) last_time_created: Option<OffsetDateTime>,
}

/// Per type and favourite state counts for a user.
#[derive(Debug, sqlx::FromRow)]
pub struct ConversationCountRecord {
    #[sqlx(rename = "type")]
    pub(crate) conversation_type: i32,
    pub(crate) is_favourite: bool,
    pub(crate) total: i64,
}

/// Conversation shared between a reference user and another user.
#[derive(Debug, sqlx::FromRow)]
pub struct SharedConversationRecord {
    pub(crate) other_user_id: i64,
    pub(crate) id: i64,
    #[sqlx(rename = "type")]
    pub(crate) conversation_type: i32,
    pub(crate) name: Option<String>,
}
