use crate::adapters::database::DbPool;
use crate::adapters::database::favourite_repo::FavouriteRepository;
use crate::domain::favourite::{Favourite, FavouriteArea};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

/// Generic per-user starring of items owned by any component.
#[derive(Clone, Debug)]
pub struct FavouriteService {
    pool: DbPool,
    repo: FavouriteRepository,
}

impl FavouriteService {
    #[must_use]
    pub const fn new(pool: DbPool, repo: FavouriteRepository) -> Self {
        Self { pool, repo }
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(component = area.component))]
    pub async fn is_favourite(&self, area: FavouriteArea, item_id: i64, user_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(self.repo.find(&mut conn, area, item_id, user_id).await?.is_some())
    }

    /// # Errors
    /// Returns `AppError::Database` if the lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(component = area.component))]
    pub async fn get_favourite(&self, area: FavouriteArea, item_id: i64, user_id: i64) -> Result<Option<Favourite>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find(&mut conn, area, item_id, user_id).await
    }

    /// Stars an item. Starring it again returns the existing favourite.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(component = area.component))]
    pub async fn set_favourite(
        &self,
        area: FavouriteArea,
        item_id: i64,
        user_id: i64,
        ordering: Option<i32>,
    ) -> Result<Favourite> {
        let mut conn = self.pool.acquire().await?;
        self.set_favourite_with(&mut conn, area, item_id, user_id, ordering).await
    }

    pub(crate) async fn set_favourite_with(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        item_id: i64,
        user_id: i64,
        ordering: Option<i32>,
    ) -> Result<Favourite> {
        self.repo.insert(conn, area, item_id, user_id, ordering).await
    }

    /// Unstars an item.
    ///
    /// # Errors
    /// Returns `AppError::InvalidState` if the item is not starred by the user.
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(component = area.component))]
    pub async fn unset_favourite(&self, area: FavouriteArea, item_id: i64, user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if self.repo.delete(&mut conn, area, item_id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::InvalidState("Favourite does not exist".into()))
        }
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(component = area.component))]
    pub async fn list_favourites(&self, area: FavouriteArea, user_id: i64) -> Result<Vec<Favourite>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_for_user(&mut conn, area, user_id).await
    }

    pub(crate) async fn delete_for_item_with(
        &self,
        conn: &mut PgConnection,
        area: FavouriteArea,
        item_id: i64,
    ) -> Result<u64> {
        self.repo.delete_for_item(conn, area, item_id).await
    }
}
