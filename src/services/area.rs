use crate::adapters::database::DbPool;
use crate::adapters::database::directory_repo::DirectoryRepository;
use crate::domain::conversation::ConversationArea;
use crate::error::Result;
use async_trait::async_trait;

/// Component and item type of conversations bound to a course group.
pub const GROUP_AREA_COMPONENT: &str = "core_group";
pub const GROUP_AREA_ITEM_TYPE: &str = "groups";

/// Display details of the entity a conversation is linked to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaDetails {
    pub subname: Option<String>,
    pub image_url: Option<String>,
}

/// Resolves display details for linked group conversations.
#[async_trait]
pub trait AreaResolver: Send + Sync + std::fmt::Debug {
    /// Returns `None` for areas the resolver does not know.
    ///
    /// # Errors
    /// Returns an error if the owning component could not be queried.
    async fn resolve(&self, area: &ConversationArea) -> Result<Option<AreaDetails>>;
}

/// Resolves course groups: the course name becomes the subname, the group picture the image.
#[derive(Clone, Debug)]
pub struct LinkedAreaResolver {
    pool: DbPool,
    repo: DirectoryRepository,
}

impl LinkedAreaResolver {
    #[must_use]
    pub const fn new(pool: DbPool, repo: DirectoryRepository) -> Self {
        Self { pool, repo }
    }
}

#[async_trait]
impl AreaResolver for LinkedAreaResolver {
    #[tracing::instrument(level = "debug", skip(self, area), fields(component = %area.component, item_id = area.item_id))]
    async fn resolve(&self, area: &ConversationArea) -> Result<Option<AreaDetails>> {
        if area.component != GROUP_AREA_COMPONENT || area.item_type != GROUP_AREA_ITEM_TYPE {
            return Ok(None);
        }

        let mut conn = self.pool.acquire().await?;
        let group = self.repo.find_course_group(&mut conn, area.item_id).await?;
        Ok(group.map(|g| AreaDetails { subname: Some(g.course_full_name), image_url: g.picture_url }))
    }
}
