use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use time::OffsetDateTime;

/// Kind of conversation. Stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum ConversationType {
    Individual = 1,
    Group = 2,
    #[serde(rename = "self")]
    SelfConversation = 3,
}

impl ConversationType {
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Conversations whose membership is fixed at creation and deduplicated by hash.
    #[must_use]
    pub const fn is_hashed(self) -> bool {
        match self {
            Self::Individual | Self::SelfConversation => true,
            Self::Group => false,
        }
    }

    /// Number of distinct members the type requires, if it is fixed.
    #[must_use]
    pub const fn required_members(self) -> Option<usize> {
        match self {
            Self::Individual => Some(2),
            Self::SelfConversation => Some(1),
            Self::Group => None,
        }
    }
}

impl TryFrom<i32> for ConversationType {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Individual),
            2 => Ok(Self::Group),
            3 => Ok(Self::SelfConversation),
            other => Err(format!("Unknown conversation type: {other}")),
        }
    }
}

impl fmt::Display for ConversationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual => write!(f, "individual"),
            Self::Group => write!(f, "group"),
            Self::SelfConversation => write!(f, "self"),
        }
    }
}

/// Deduplication key for individual and self conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationHash(String);

impl ConversationHash {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConversationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hashes a participant set. Order and duplicates do not affect the result.
#[must_use]
pub fn conversation_hash(user_ids: &[i64]) -> ConversationHash {
    let mut ids = user_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join("-");
    ConversationHash(hex::encode(Sha256::digest(joined.as_bytes())))
}

/// Binds a conversation to an entity owned by another component, such as a course group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationArea {
    pub component: String,
    pub item_type: String,
    pub item_id: i64,
    pub context_id: i64,
}

impl ConversationArea {
    #[must_use]
    pub fn new(component: impl Into<String>, item_type: impl Into<String>, item_id: i64, context_id: i64) -> Self {
        Self { component: component.into(), item_type: item_type.into(), item_id, context_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub r#type: ConversationType,
    pub name: Option<String>,
    pub hash: Option<ConversationHash>,
    pub enabled: bool,
    pub area: Option<ConversationArea>,
    pub time_created: OffsetDateTime,
    pub time_modified: OffsetDateTime,
}

impl Conversation {
    /// Disabled group conversations are hidden from listings and reject new messages.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        match self.r#type {
            ConversationType::Group => self.enabled,
            ConversationType::Individual | ConversationType::SelfConversation => true,
        }
    }
}

/// Per-user action on a conversation kept in the conversation actions table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConversationAction {
    Muted = 1,
}

impl ConversationAction {
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationActionRecord {
    pub id: i64,
    pub user_id: i64,
    pub conversation_id: i64,
    pub action: ConversationAction,
    pub time_created: OffsetDateTime,
}

/// Parameters for creating a conversation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub r#type: ConversationType,
    pub user_ids: Vec<i64>,
    pub name: Option<String>,
    pub enabled: bool,
    pub area: Option<ConversationArea>,
}

impl NewConversation {
    #[must_use]
    pub fn new(r#type: ConversationType, user_ids: Vec<i64>) -> Self {
        Self { r#type, user_ids, name: None, enabled: true, area: None }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_area(mut self, area: ConversationArea) -> Self {
        self.area = Some(area);
        self
    }

    /// Distinct member ids in ascending order.
    #[must_use]
    pub fn distinct_user_ids(&self) -> Vec<i64> {
        let mut ids = self.user_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
