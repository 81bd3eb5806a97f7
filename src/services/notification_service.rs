use crate::adapters::database::DbPool;
use crate::adapters::database::notification_repo::NotificationRepository;
use crate::domain::notification::{NewNotification, Notification};
use crate::error::{AppError, Result};
use crate::services::page_limit;
use time::OffsetDateTime;

/// Site notifications (alerts) addressed to single users.
#[derive(Clone, Debug)]
pub struct NotificationService {
    pool: DbPool,
    repo: NotificationRepository,
}

impl NotificationService {
    #[must_use]
    pub const fn new(pool: DbPool, repo: NotificationRepository) -> Self {
        Self { pool, repo }
    }

    /// # Errors
    /// Returns `AppError::InvalidArgument` if the component or event type is blank.
    /// Returns `AppError::NotFound` if either user does not exist.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, params),
        fields(user_id_to = params.user_id_to, component = %params.component)
    )]
    pub async fn create_notification(&self, params: NewNotification) -> Result<Notification> {
        if params.component.trim().is_empty() || params.event_type.trim().is_empty() {
            return Err(AppError::InvalidArgument("Notifications need a component and an event type".into()));
        }

        let mut conn = self.pool.acquire().await?;
        let notification = self.repo.create(&mut conn, &params).await?;
        tracing::debug!(notification_id = notification.id, "Notification created");
        Ok(notification)
    }

    /// # Errors
    /// Returns `AppError::NotFound` if the notification does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_notification(&self, notification_id: i64) -> Result<Notification> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_by_id(&mut conn, notification_id).await?.ok_or(AppError::NotFound)
    }

    /// Records the read time. A notification already read keeps its first read time.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the notification does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mark_notification_as_read(
        &self,
        notification_id: i64,
        time_read: Option<OffsetDateTime>,
    ) -> Result<OffsetDateTime> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_read(&mut conn, notification_id, time_read.unwrap_or_else(OffsetDateTime::now_utc)).await
    }

    /// Marks the user's unread notifications as read, optionally only those from one sender.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mark_all_notifications_as_read(&self, user_id_to: i64, user_id_from: Option<i64>) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.mark_all_read(&mut conn, user_id_to, user_id_from, OffsetDateTime::now_utc()).await
    }

    /// Newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_notifications(
        &self,
        user_id_to: i64,
        unread_only: bool,
        limit_from: i64,
        limit_num: i64,
    ) -> Result<Vec<Notification>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_for_user(&mut conn, user_id_to, unread_only, limit_from.max(0), page_limit(limit_num)).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn count_unread_notifications(&self, user_id_to: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.count_unread(&mut conn, user_id_to).await
    }
}
