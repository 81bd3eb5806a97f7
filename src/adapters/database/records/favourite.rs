use crate::domain::favourite::Favourite;
use time::OffsetDateTime;

#[derive(Debug, sqlx::FromRow)]
pub struct FavouriteRecord {
    pub(crate) id: i64,
    pub(crate) component: String,
    pub(crate) item_type: String,
    pub(crate) item_id: i64,
    pub(crate) user_id: i64,
    pub(crate) ordering: Option<i32>,
    pub(crate) time_created: OffsetDateTime,
    pub(crate) time_modified: OffsetDateTime,
}

impl From<FavouriteRecord> for Favourite {
    fn from(record: FavouriteRecord) -> Self {
        Self {
            id: record.id,
            component: record.component,
            item_type: record.item_type,
            item_id: record.item_id,
            user_id: record.user_id,
            ordering: record.ordering,
            time_created: record.time_created,
            time_modified: record.time_modified,
        }
    }
}
