use crate::domain::contact::ContactRequest;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub deleted: bool,
    pub time_created: OffsetDateTime,
}

impl User {
    #[must_use]
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

pub(crate) fn full_name(first: &str, last: &str) -> String {
    match (first.trim(), last.trim()) {
        ("", "") => String::new(),
        (f, "") => f.to_string(),
        ("", l) => l.to_string(),
        (f, l) => format!("{f} {l}"),
    }
}

/// Minimal identity of a conversation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberProfile {
    pub id: i64,
    pub full_name: String,
    pub is_deleted: bool,
}

impl From<&User> for MemberProfile {
    fn from(user: &User) -> Self {
        Self { id: user.id, full_name: user.full_name(), is_deleted: user.deleted }
    }
}

/// A participant as seen by a specific reference user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberInfo {
    pub id: i64,
    pub full_name: String,
    pub is_contact: bool,
    pub is_blocked: bool,
    pub is_deleted: bool,
    /// Present when privacy information was requested.
    pub can_message: Option<bool>,
    /// Present when privacy information was requested.
    pub requires_contact: Option<bool>,
    /// Present when contact requests were requested.
    pub contact_requests: Option<Vec<ContactRequest>>,
}
