use crate::adapters::database::records::FavouriteRecord;
use crate::domain::favourite::{Favourite, FavouriteArea};
use crate::error::Result;
use sqlx::PgConnection;

const FAVOURITE_COLUMNS: &str = "f.id, f.component, f.item_type, f.item_id, f.user_id, f.ordering, \
                                 f.time_created, f.time_modified";

#[derive(Clone, Debug, Default)]
pub struct FavouriteRepository {}

impl FavouriteRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Finds a user's favourite for an item.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(component = area.component))]
    pub(crate) async fn find(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        item_id: i64,
        user_id: i64,
    ) -> Result<Option<Favourite>> {
        let record = sqlx::query_as::<_, FavouriteRecord>(&format!(
            r#"
            SELECT {FAVOURITE_COLUMNS}
            FROM favourites f
            WHERE f.component = $1 AND f.item_type = $2 AND f.item_id = $3 AND f.user_id = $4
            "#
        ))
        .bind(area.component)
        .bind(area.item_type)
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Inserts a favourite, returning the existing row when the item is already starred.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the upsert fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(component = area.component))]
    pub(crate) async fn insert(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        item_id: i64,
        user_id: i64,
        ordering: Option<i32>,
    ) -> Result<Favourite> {
        let record = sqlx::query_as::<_, FavouriteRecord>(
            r#"
            INSERT INTO favourites AS f (component, item_type, item_id, user_id, ordering)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (component, item_type, item_id, user_id) DO UPDATE SET component = f.component
            RETURNING f.id, f.component, f.item_type, f.item_id, f.user_id, f.ordering,
                      f.time_created, f.time_modified
            "#,
        )
        .bind(area.component)
        .bind(area.item_type)
        .bind(item_id)
        .bind(user_id)
        .bind(ordering)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Deletes a user's favourite. Returns false when the item was not starred.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(component = area.component))]
    pub(crate) async fn delete(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        item_id: i64,
        user_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM favourites WHERE component = $1 AND item_type = $2 AND item_id = $3 AND user_id = $4",
        )
        .bind(area.component)
        .bind(area.item_type)
        .bind(item_id)
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes every user's favourite for an item.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(component = area.component))]
    pub(crate) async fn delete_for_item(&self, conn: &mut PgConnection, area: FavouriteArea, item_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM favourites WHERE component = $1 AND item_type = $2 AND item_id = $3")
            .bind(area.component)
            .bind(area.item_type)
            .bind(item_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// A user's favourites in an area, by ordering then creation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(component = area.component))]
    pub(crate) async fn find_for_user(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        user_id: i64,
    ) -> Result<Vec<Favourite>> {
        let records = sqlx::query_as::<_, FavouriteRecord>(&format!(
            r#"
            SELECT {FAVOURITE_COLUMNS}
            FROM favourites f
            WHERE f.component = $1 AND f.item_type = $2 AND f.user_id = $3
            ORDER BY f.ordering ASC NULLS LAST, f.time_created ASC, f.id ASC
            "#
        ))
        .bind(area.component)
        .bind(area.item_type)
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}
