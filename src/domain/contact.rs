use serde::Serialize;
use time::OffsetDateTime;

/// Confirmed contact. Stored once per pair but effective in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    pub user_id: i64,
    pub contact_id: i64,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
}

impl Contact {
    /// The member of the pair that is not `user_id`.
    #[must_use]
    pub const fn other(&self, user_id: i64) -> i64 {
        if self.user_id == user_id { self.contact_id } else { self.user_id }
    }
}

/// Pending request from `user_id` to `requested_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRequest {
    pub id: i64,
    pub user_id: i64,
    pub requested_user_id: i64,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
}

/// `user_id` has blocked `blocked_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedUser {
    pub id: i64,
    pub user_id: i64,
    pub blocked_user_id: i64,
    #[serde(with = "time::serde::timestamp")]
    pub time_created: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_other() {
        let contact = Contact { id: 1, user_id: 10, contact_id: 20, time_created: OffsetDateTime::UNIX_EPOCH };
        assert_eq!(contact.other(10), 20);
        assert_eq!(contact.other(20), 10);
    }
}
