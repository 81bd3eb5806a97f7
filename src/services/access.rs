use crate::adapters::database::DbPool;
use crate::adapters::database::directory_repo::DirectoryRepository;
use crate::domain::capability::{Capability, Scope};
use crate::error::Result;
use async_trait::async_trait;

/// Capability, enrolment and existence checks answered by the surrounding user directory.
#[async_trait]
pub trait AccessOracle: Send + Sync + std::fmt::Debug {
    /// Whether `user_id` holds `capability` in `scope`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be consulted.
    async fn has_capability(&self, user_id: i64, capability: Capability, scope: Scope) -> Result<bool>;

    /// Whether two users are enrolled in a common course.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be consulted.
    async fn shares_course(&self, user_a: i64, user_b: i64) -> Result<bool>;

    /// Whether a non-deleted user exists.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be consulted.
    async fn user_exists(&self, user_id: i64) -> Result<bool>;
}

/// Oracle backed by the grant, enrolment and user tables.
#[derive(Clone, Debug)]
pub struct DirectoryOracle {
    pool: DbPool,
    repo: DirectoryRepository,
}

impl DirectoryOracle {
    #[must_use]
    pub const fn new(pool: DbPool, repo: DirectoryRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl AccessOracle for DirectoryOracle {
    #[tracing::instrument(level = "debug", skip(self), fields(capability = %capability))]
    async fn has_capability(&self, user_id: i64, capability: Capability, scope: Scope) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let grant = self.repo.find_grant(&mut conn, user_id, capability, scope).await?;
        Ok(grant.unwrap_or_else(|| capability.granted_by_default()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn shares_course(&self, user_a: i64, user_b: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.shares_course(&mut conn, user_a, user_b).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.user_exists(&mut conn, user_id).await
    }
}
