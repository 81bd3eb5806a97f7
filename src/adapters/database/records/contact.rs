use crate::domain::contact::{BlockedUser, Contact, ContactRequest};
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct ContactRecord {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) contact_id: i64,
    pub(crate) time_created: OffsetDateTime,
}

impl From<ContactRecord> for Contact {
    fn from(record: ContactRecord) -> Self {
        Self { id: record.id, user_id: record.user_id, contact_id: record.contact_id, time_created: record.time_created }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ContactRequestRecord {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) requested_user_id: i64,
    pub(crate) time_created: OffsetDateTime,
}

impl From<ContactRequestRecord> for ContactRequest {
    fn from(record: ContactRequestRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            requested_user_id: record.requested_user_id,
            time_created: record.time_created,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct BlockedUserRecord {
    pub(crate) id: i64,
    pub(crate) user_id: i64,
    pub(crate) blocked_user_id: i64,
    pub(crate) time_created: OffsetDateTime,
}

impl From<BlockedUserRecord> for BlockedUser {
    fn from(record: BlockedUserRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            blocked_user_id: record.blocked_user_id,
            time_created: record.time_created,
        }
    }
}
