use crate::adapters::database::records::ConversationActionRow;
use crate::domain::conversation::{ConversationAction, ConversationActionRecord};
use crate::error::{AppError, Result};
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct ConversationActionRepository {}

impl ConversationActionRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Records an action, returning the existing row when it is already present.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the upsert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn set(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: i64,
        action: ConversationAction,
    ) -> Result<ConversationActionRecord> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, ConversationActionRow>(
            r#"
            INSERT INTO message_conversation_actions AS a (user_id, conversation_id, action)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, conversation_id, action) DO UPDATE SET action = a.action
            RETURNING a.id, a.user_id, a.conversation_id, a.action, a.time_created
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(action.code())
        .fetch_one(conn)
        .await?;

        ConversationActionRecord::try_from(row).map_err(|e| {
            tracing::error!(error = %e, "Database data corruption: invalid conversation action row");
            AppError::Internal
        })
    }

    /// Removes an action. Returns false when there was nothing to remove.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn unset(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: i64,
        action: ConversationAction,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM message_conversation_actions WHERE user_id = $1 AND conversation_id = $2 AND action = $3",
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(action.code())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Checks whether the user has recorded the action on the conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn exists(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: i64,
        action: ConversationAction,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM message_conversation_actions
                WHERE user_id = $1 AND conversation_id = $2 AND action = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(action.code())
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Users among `user_ids` who recorded the action on the conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, user_ids), fields(count = user_ids.len()))]
    pub(crate) async fn find_users_with(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
        user_ids: &[i64],
        action: ConversationAction,
    ) -> Result<Vec<i64>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM message_conversation_actions
            WHERE conversation_id = $1 AND user_id = ANY($2) AND action = $3
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids)
        .bind(action.code())
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// Removes every action recorded on a conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_for_conversation(&self, conn: &mut PgConnection, conversation_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message_conversation_actions WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}
