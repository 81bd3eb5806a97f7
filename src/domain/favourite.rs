use time::OffsetDateTime;

/// Component and item type that own a set of favourites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavouriteArea {
    pub component: &'static str,
    pub item_type: &'static str,
}

/// Area under which starred conversations are recorded.
pub const CONVERSATION_FAVOURITES: FavouriteArea =
    FavouriteArea { component: "core_message", item_type: "message_conversations" };

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Favourite {
    pub id: i64,
    pub component: String,
    pub item_type: String,
    pub item_id: i64,
    pub user_id: i64,
    pub ordering: Option<i32>,
    pub time_created: OffsetDateTime,
    pub time_modified: OffsetDateTime,
}
