use serde::Serialize;

/// Preference name under which the privacy setting is stored.
pub const PRIVACY_PREFERENCE_NAME: &str = "message_blocknoncontacts";

/// Who may start an individual conversation with a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum PrivacyPreference {
    OnlyContacts = 0,
    #[default]
    CourseMember = 1,
    Site = 2,
}

impl PrivacyPreference {
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// `Site` only takes effect while site-wide messaging is allowed.
    #[must_use]
    pub const fn effective(self, allow_all_users: bool) -> Self {
        match self {
            Self::Site if !allow_all_users => Self::CourseMember,
            other => other,
        }
    }

    /// Decides the relationship part of the policy for an effective preference.
    #[must_use]
    pub const fn permits(self, is_contact: bool, shares_course: bool) -> bool {
        match self {
            Self::OnlyContacts => is_contact,
            Self::CourseMember => is_contact || shares_course,
            Self::Site => true,
        }
    }

    /// Whether a sender needs to be a contact to reach a user with this preference.
    #[must_use]
    pub const fn requires_contact(self) -> bool {
        matches!(self, Self::OnlyContacts)
    }
}

impl TryFrom<i32> for PrivacyPreference {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::OnlyContacts),
            1 => Ok(Self::CourseMember),
            2 => Ok(Self::Site),
            other => Err(format!("Unknown privacy preference: {other}")),
        }
    }
}

impl std::str::FromStr for PrivacyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: i32 = s.trim().parse().map_err(|_| format!("Invalid privacy preference value: {s}"))?;
        Self::try_from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_course_member() {
        assert_eq!(PrivacyPreference::default(), PrivacyPreference::CourseMember);
    }

    #[test]
    fn test_site_downgrades_without_site_wide_messaging() {
        assert_eq!(PrivacyPreference::Site.effective(false), PrivacyPreference::CourseMember);
        assert_eq!(PrivacyPreference::Site.effective(true), PrivacyPreference::Site);
        assert_eq!(PrivacyPreference::OnlyContacts.effective(true), PrivacyPreference::OnlyContacts);
    }

    #[test]
    fn test_permits_table() {
        let cases = [
            (PrivacyPreference::OnlyContacts, false, false, false),
            (PrivacyPreference::OnlyContacts, false, true, false),
            (PrivacyPreference::OnlyContacts, true, false, true),
            (PrivacyPreference::CourseMember, false, false, false),
            (PrivacyPreference::CourseMember, false, true, true),
            (PrivacyPreference::CourseMember, true, false, true),
            (PrivacyPreference::Site, false, false, true),
        ];
        for (pref, is_contact, shares_course, expected) in cases {
            assert_eq!(pref.permits(is_contact, shares_course), expected, "{pref:?} {is_contact} {shares_course}");
        }
    }

    #[test]
    fn test_parse_stored_value() {
        assert_eq!("0".parse::<PrivacyPreference>(), Ok(PrivacyPreference::OnlyContacts));
        assert_eq!(" 2 ".parse::<PrivacyPreference>(), Ok(PrivacyPreference::Site));
        assert!("7".parse::<PrivacyPreference>().is_err());
        assert!("site".parse::<PrivacyPreference>().is_err());
    }
}
