use crate::adapters::database::records::NotificationRecord;
use crate::domain::notification::{NewNotification, Notification};
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use time::OffsetDateTime;

const NOTIFICATION_COLUMNS: &str = "n.id, n.user_id_from, n.user_id_to, n.subject, n.full_message, n.component, \
                                    n.event_type, n.context_url, n.time_created, n.time_read";

#[derive(Clone, Debug, Default)]
pub struct NotificationRepository {}

impl NotificationRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Stores a notification.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the sender or recipient does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, params), fields(user_id_to = params.user_id_to))]
    pub(crate) async fn create(&self, conn: &mut PgConnection, params: &NewNotification) -> Result<Notification> {
        let result = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO notifications AS n
                (user_id_from, user_id_to, subject, full_message, component, event_type, context_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING n.id, n.user_id_from, n.user_id_to, n.subject, n.full_message, n.component,
                      n.event_type, n.context_url, n.time_created, n.time_read
            "#,
        )
        .bind(params.user_id_from)
        .bind(params.user_id_to)
        .bind(&params.subject)
        .bind(&params.full_message)
        .bind(&params.component)
        .bind(&params.event_type)
        .bind(params.context_url.as_deref())
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: i64) -> Result<Option<Notification>> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications n WHERE n.id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(record.map(Into::into))
    }

    /// Sets the read time unless one is already recorded. Returns the stored read time.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the notification does not exist.
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_read(
        &self,
        conn: &mut PgConnection,
        id: i64,
        time_read: OffsetDateTime,
    ) -> Result<OffsetDateTime> {
        let stored: Option<Option<OffsetDateTime>> = sqlx::query_scalar(
            "UPDATE notifications SET time_read = COALESCE(time_read, $2) WHERE id = $1 RETURNING time_read",
        )
        .bind(id)
        .bind(time_read)
        .fetch_optional(conn)
        .await?;

        stored.flatten().ok_or(AppError::NotFound)
    }

    /// Marks every unread notification to the user as read, optionally only those from one sender.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_all_read(
        &self,
        conn: &mut PgConnection,
        user_id_to: i64,
        user_id_from: Option<i64>,
        time_read: OffsetDateTime,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET time_read = $3
            WHERE user_id_to = $1 AND time_read IS NULL AND ($2::INT8 IS NULL OR user_id_from = $2)
            "#,
        )
        .bind(user_id_to)
        .bind(user_id_from)
        .bind(time_read)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// A page of the user's notifications, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_for_user(
        &self,
        conn: &mut PgConnection,
        user_id_to: i64,
        unread_only: bool,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications n
            WHERE n.user_id_to = $1 AND (NOT $2 OR n.time_read IS NULL)
            ORDER BY n.time_created DESC, n.id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id_to)
        .bind(unread_only)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_unread(&self, conn: &mut PgConnection, user_id_to: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id_to = $1 AND time_read IS NULL")
                .bind(user_id_to)
                .fetch_one(conn)
                .await?;
        Ok(count)
    }
}
