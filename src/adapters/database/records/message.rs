use crate::domain::message::{IndexableMessage, Message, MessageFormat};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) conversation_id: i64,
    pub(crate) user_id_from: i64,
    pub(crate) subject: Option<String>,
    pub(crate) full_message: String,
    pub(crate) full_message_format: i32,
    pub(crate) small_message: String,
    pub(crate) time_created: OffsetDateTime,
}

impl TryFrom<MessageRecord> for Message {
    type Error = String;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            conversation_id: record.conversation_id,
            user_id_from: record.user_id_from,
            subject: record.subject,
            full_message: record.full_message,
            full_message_format: MessageFormat::try_from(record.full_message_format)?,
            small_message: record.small_message,
            time_created: record.time_created,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct IndexableMessageRecord {
    pub(crate) id: i64,
    pub(crate) conversation_id: i64,
    pub(crate) user_id_from: i64,
    pub(crate) full_message: String,
    pub(crate) member_ids: Vec<i64>,
    pub(crate) time_created: OffsetDateTime,
    pub(crate) xact_id: i64,
}

impl From<IndexableMessageRecord> for IndexableMessage {
    fn from(record: IndexableMessageRecord) -> Self {
        Self {
            id: record.id,
            conversation_id: record.conversation_id,
            user_id_from: record.user_id_from,
            full_message: record.full_message,
            member_ids: record.member_ids,
            time_created: record.time_created,
            xact_id: record.xact_id,
        }
    }
}

/// Most recent matching message of a conversation, as seen by the searching user.
#[derive(Debug, sqlx::FromRow)]
pub struct MessageSearchRecord {
    pub(crate) id: i64,
    pub(crate) conversation_id: i64,
    #[sqlx(rename = "type")]
    pub(crate) conversation_type: i32,
    pub(crate) conversation_name: Option<String>,
    pub(crate) user_id_from: i64,
    pub(crate) from_first_name: String,
    pub(crate) from_last_name: String,
    pub(crate) other_user_id: Option<i64>,
    pub(crate) small_message: String,
    pub(crate) is_blocked: bool,
    pub(crate) time_created: OffsetDateTime,
}
