use crate::domain::conversation::ConversationType;
use serde::Serialize;
use time::OffsetDateTime;

/// Event handed to the notification dispatcher, one per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispatchPayload {
    ConversationMessage {
        conversation_id: i64,
        conversation_type: ConversationType,
        /// Group name; individual conversations carry none.
        conversation_name: Option<String>,
        conversation_image_url: Option<String>,
        message_id: i64,
        user_id_from: i64,
        small_message: String,
        /// Recipient muted the conversation; dispatchers should deliver silently.
        muted: bool,
        time_created: i64,
    },
    ContactRequest {
        request_id: i64,
        user_id_from: i64,
        time_created: i64,
    },
}

impl DispatchPayload {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConversationMessage { .. } => "conversation_message",
            Self::ContactRequest { .. } => "contact_request",
        }
    }
}

/// Site notification addressed to a single user. Read state lives on the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    pub user_id_from: i64,
    pub user_id_to: i64,
    pub subject: String,
    pub full_message: String,
    pub component: String,
    pub event_type: String,
    pub context_url: Option<String>,
    pub time_created: OffsetDateTime,
    pub time_read: Option<OffsetDateTime>,
}

impl Notification {
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.time_read.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id_from: i64,
    pub user_id_to: i64,
    pub subject: String,
    pub full_message: String,
    pub component: String,
    pub event_type: String,
    pub context_url: Option<String>,
}
