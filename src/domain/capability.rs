use std::fmt;

/// Permissions consulted by the messaging core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SendMessage,
    MessageAnyUser,
    DeleteAnyMessage,
    CreateGroupConversations,
    ViewAllProfiles,
}

impl Capability {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::SendMessage => "messaging:send",
            Self::MessageAnyUser => "messaging:message_any_user",
            Self::DeleteAnyMessage => "messaging:delete_any_message",
            Self::CreateGroupConversations => "course:create_group_conversations",
            Self::ViewAllProfiles => "user:view_details",
        }
    }

    /// Outcome when no grant row exists for a user.
    #[must_use]
    pub const fn granted_by_default(self) -> bool {
        matches!(self, Self::SendMessage)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a capability is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    System,
    Course(i64),
}

impl Scope {
    #[must_use]
    pub const fn course_id(self) -> Option<i64> {
        match self {
            Self::System => None,
            Self::Course(id) => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_send_message_is_default() {
        assert!(Capability::SendMessage.granted_by_default());
        assert!(!Capability::MessageAnyUser.granted_by_default());
        assert!(!Capability::CreateGroupConversations.granted_by_default());
    }

    #[test]
    fn test_scope_course_id() {
        assert_eq!(Scope::System.course_id(), None);
        assert_eq!(Scope::Course(9).course_id(), Some(9));
    }
}
