pub mod access;
pub mod aggregation_service;
pub mod area;
pub mod contact_service;
pub mod conversation_service;
pub mod dispatch;
pub mod favourite_service;
pub mod message_service;
pub mod notification_service;
pub mod privacy_service;

/// Page size for `LIMIT`; zero or negative means no limit.
pub(crate) const fn page_limit(limit_num: i64) -> Option<i64> {
    if limit_num > 0 { Some(limit_num) } else { None }
}

/// Page size for searches, which are never unbounded: zero means `max`, larger values are capped.
pub(crate) fn bounded_page_limit(limit_num: i64, max: i64) -> i64 {
    if limit_num > 0 { limit_num.min(max) } else { max }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(0), None);
        assert_eq!(page_limit(-3), None);
        assert_eq!(page_limit(25), Some(25));
    }

    #[test]
    fn test_bounded_page_limit() {
        assert_eq!(bounded_page_limit(0, 500), 500);
        assert_eq!(bounded_page_limit(20, 500), 20);
        assert_eq!(bounded_page_limit(1000, 500), 500);
    }
}
