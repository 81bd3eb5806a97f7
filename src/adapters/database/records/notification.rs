use crate::domain::notification::Notification;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationRecord {
    pub(crate) id: i64,
    pub(crate) user_id_from: i64,
    pub(crate) user_id_to: i64,
    pub(crate) subject: String,
    pub(crate) full_message: String,
    pub(crate) component: String,
    pub(crate) event_type: String,
    pub(crate) context_url: Option<String>,
    pub(crate) time_created: OffsetDateTime,
    pub(crate) time_read: Option<OffsetDateTime>,
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            user_id_from: record.user_id_from,
            user_id_to: record.user_id_to,
            subject: record.subject,
            full_message: record.full_message,
            component: record.component,
            event_type: record.event_type,
            context_url: record.context_url,
            time_created: record.time_created,
            time_read: record.time_read,
        }
    }
}
