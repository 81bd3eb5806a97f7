use crate::domain::user::User;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: i64,
    pub(crate) username: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) deleted: bool,
    pub(crate) time_created: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            first_name: record.first_name,
            last_name: record.last_name,
            deleted: record.deleted,
            time_created: record.time_created,
        }
    }
}

/// A user paired with the conversation it was selected for.
#[derive(Debug, sqlx::FromRow)]
pub struct ConversationUserRecord {
    pub(crate) conversation_id: i64,
    #[sqlx(flatten)]
    pub(crate) user: UserRecord,
}

/// Linked group resolved for a conversation area.
#[derive(Debug, sqlx::FromRow)]
pub struct CourseGroupRecord {
    pub(crate) course_full_name: String,
    pub(crate) picture_url: Option<String>,
}
