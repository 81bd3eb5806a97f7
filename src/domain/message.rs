use crate::domain::user::MemberProfile;
use serde::Serialize;
use time::OffsetDateTime;

/// Text format of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum MessageFormat {
    #[default]
    Auto = 0,
    Html = 1,
    Plain = 2,
    Markdown = 4,
}

impl MessageFormat {
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for MessageFormat {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Html),
            2 => Ok(Self::Plain),
            4 => Ok(Self::Markdown),
            other => Err(format!("Unknown message format: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id_from: i64,
    pub subject: Option<String>,
    pub full_message: String,
    pub full_message_format: MessageFormat,
    pub small_message: String,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
}

/// Per-user action on a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MessageAction {
    Read = 1,
    Deleted = 2,
}

impl MessageAction {
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    TimeCreatedAsc,
    TimeCreatedDesc,
}

impl SortOrder {
    pub(crate) const fn sql(self) -> &'static str {
        match self {
            Self::TimeCreatedAsc => "ASC",
            Self::TimeCreatedDesc => "DESC",
        }
    }
}

/// Slice of a conversation requested by a member.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageQuery {
    pub limit_from: i64,
    /// Zero means no limit.
    pub limit_num: i64,
    pub sort: SortOrder,
    pub time_from: Option<OffsetDateTime>,
    pub time_to: Option<OffsetDateTime>,
}

impl MessageQuery {
    #[must_use]
    pub const fn page(limit_from: i64, limit_num: i64) -> Self {
        Self { limit_from, limit_num, sort: SortOrder::TimeCreatedAsc, time_from: None, time_to: None }
    }

    #[must_use]
    pub const fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn between(mut self, time_from: Option<OffsetDateTime>, time_to: Option<OffsetDateTime>) -> Self {
        self.time_from = time_from;
        self.time_to = time_to;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessages {
    pub id: i64,
    pub members: Vec<MemberProfile>,
    pub messages: Vec<Message>,
}

/// Message as exposed to the search indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexableMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub user_id_from: i64,
    pub full_message: String,
    /// Members at the time of indexing, used as the document's access list.
    pub member_ids: Vec<i64>,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
    /// Id of the transaction that inserted the message.
    #[serde(skip)]
    pub xact_id: i64,
}

/// Keyset position of the indexer over `(xact_id, id)`.
///
/// Transaction ids below the oldest running transaction are final, so a message that
/// commits late still sorts after any cursor saved before it became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCursor {
    pub xact_id: i64,
    pub id: i64,
}

impl IndexCursor {
    const PREFIX: &'static str = "xact";

    /// Position just after `message`.
    #[must_use]
    pub const fn after(message: &IndexableMessage) -> Self {
        Self { xact_id: message.xact_id, id: message.id }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", Self::PREFIX, self.xact_id, self.id)
    }

    /// Parses a cursor written by [`IndexCursor::encode`].
    ///
    /// # Errors
    /// Returns a description of the problem when the value is malformed.
    pub fn decode(value: &str) -> Result<Self, String> {
        let mut parts = value.split(':');
        let (Some(Self::PREFIX), Some(xact_id), Some(id), None) = (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("Malformed cursor: {value}"));
        };
        let xact_id: i64 = xact_id.parse().map_err(|e| format!("Malformed cursor transaction: {e}"))?;
        let id: i64 = id.parse().map_err(|e| format!("Malformed cursor id: {e}"))?;
        Ok(Self { xact_id, id })
    }
}

/// Plain-text preview used for notifications and list views.
#[must_use]
pub fn small_message(text: &str, max_chars: usize) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }
    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes() {
        assert_eq!(MessageFormat::try_from(1), Ok(MessageFormat::Html));
        assert_eq!(MessageFormat::try_from(4), Ok(MessageFormat::Markdown));
        assert!(MessageFormat::try_from(3).is_err());
    }

    #[test]
    fn test_small_message_strips_markup() {
        assert_eq!(small_message("<p>Hello <b>there</b></p>", 100), "Hello there");
        assert_eq!(small_message("  spaced\n\nout  ", 100), "spaced out");
    }

    #[test]
    fn test_small_message_truncates_on_char_boundary() {
        assert_eq!(small_message("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_cursor_roundtrip() {
        let cursor = IndexCursor { xact_id: 9_000_123, id: 42 };
        assert_eq!(cursor.encode(), "xact:9000123:42");
        assert_eq!(IndexCursor::decode(&cursor.encode()), Ok(cursor));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(IndexCursor::decode("nope").is_err());
        assert!(IndexCursor::decode("xact:12:abc").is_err());
        assert!(IndexCursor::decode("xact:12:4:9").is_err());
        // Timestamp-keyed cursors from older releases are not reused.
        assert!(IndexCursor::decode("1700000000000000000:42").is_err());
    }

    #[test]
    fn test_cursor_after_message() {
        let message = IndexableMessage {
            id: 7,
            conversation_id: 1,
            user_id_from: 2,
            full_message: "hi".to_string(),
            member_ids: vec![2, 3],
            time_created: OffsetDateTime::UNIX_EPOCH,
            xact_id: 811,
        };
        assert_eq!(IndexCursor::after(&message), IndexCursor { xact_id: 811, id: 7 });
        let json = serde_json::to_value(&message).expect("message serializes");
        assert!(json.get("xact_id").is_none());
    }
}
