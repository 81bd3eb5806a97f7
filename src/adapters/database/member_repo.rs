use crate::adapters::database::records::{ConversationUserRecord, UserRecord};
use crate::domain::user::User;
use crate::error::Result;
use sqlx::PgConnection;

#[derive(Clone, Debug, Default)]
pub struct MemberRepository {}

impl MemberRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Adds members, skipping ids that are already members or do not resolve to a user.
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, user_ids), fields(count = user_ids.len()))]
    pub(crate) async fn add(&self, conn: &mut PgConnection, conversation_id: i64, user_ids: &[i64]) -> Result<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO message_conversation_members (conversation_id, user_id)
            SELECT $1, u.id FROM users u WHERE u.id = ANY($2)
            ON CONFLICT (conversation_id, user_id) DO NOTHING
            "#,
        )
        .bind(conversation_id)
        .bind(user_ids)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Removes the given members. Ids that are not members are ignored.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn, user_ids), fields(count = user_ids.len()))]
    pub(crate) async fn remove(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
        user_ids: &[i64],
    ) -> Result<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let result =
            sqlx::query("DELETE FROM message_conversation_members WHERE conversation_id = $1 AND user_id = ANY($2)")
                .bind(conversation_id)
                .bind(user_ids)
                .execute(conn)
                .await?;

        Ok(result.rows_affected())
    }

    /// Removes every member of a conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn remove_all(&self, conn: &mut PgConnection, conversation_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message_conversation_members WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Checks membership.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn is_member(&self, conn: &mut PgConnection, conversation_id: i64, user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM message_conversation_members WHERE conversation_id = $1 AND user_id = $2)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Counts the members of a conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count(&self, conn: &mut PgConnection, conversation_id: i64) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message_conversation_members WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(conn)
                .await?;
        Ok(count)
    }

    /// Member ids in ascending order.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_member_ids(&self, conn: &mut PgConnection, conversation_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT user_id FROM message_conversation_members WHERE conversation_id = $1 ORDER BY user_id",
        )
        .bind(conversation_id)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// A page of members with their user records, in join order.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_members(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name, u.deleted, u.time_created
            FROM message_conversation_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.conversation_id = $1
            ORDER BY m.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Up to `per_conversation` members of each conversation, excluding `exclude_user_id`
    /// unless they are the only member.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, conversation_ids), fields(count = conversation_ids.len()))]
    pub(crate) async fn find_previews(
        &self,
        conn: &mut PgConnection,
        conversation_ids: &[i64],
        exclude_user_id: i64,
        per_conversation: i64,
    ) -> Result<Vec<(i64, User)>> {
        if conversation_ids.is_empty() || per_conversation <= 0 {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, ConversationUserRecord>(
            r#"
            SELECT ranked.conversation_id, ranked.id, ranked.username, ranked.first_name, ranked.last_name,
                   ranked.deleted, ranked.time_created
            FROM (
                SELECT m.conversation_id, u.id, u.username, u.first_name, u.last_name, u.deleted, u.time_created,
                       ROW_NUMBER() OVER (
                           PARTITION BY m.conversation_id
                           ORDER BY (u.id = $2) ASC, m.id ASC
                       ) AS rn,
                       COUNT(*) OVER (PARTITION BY m.conversation_id) AS total
                FROM message_conversation_members m
                JOIN users u ON u.id = m.user_id
                WHERE m.conversation_id = ANY($1)
            ) ranked
            WHERE ranked.rn <= $3 AND (ranked.id <> $2 OR ranked.total = 1)
            ORDER BY ranked.conversation_id, ranked.rn
            "#,
        )
        .bind(conversation_ids)
        .bind(exclude_user_id)
        .bind(per_conversation)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(|r| (r.conversation_id, r.user.into())).collect())
    }
}
