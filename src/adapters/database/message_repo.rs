use crate::adapters::database::contains_pattern;
use crate::adapters::database::records::{IndexableMessageRecord, MessageRecord, MessageSearchRecord};
use crate::domain::message::{IndexCursor, IndexableMessage, Message, MessageAction, MessageFormat, MessageQuery};
use crate::error::{AppError, Result};
use sqlx::PgConnection;
use time::OffsetDateTime;

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.user_id_from, m.subject, m.full_message, \
                               m.full_message_format, m.small_message, m.time_created";

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Records a new message in a conversation.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the conversation or sender does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, full_message, small_message))]
    pub(crate) async fn create(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
        user_id_from: i64,
        full_message: &str,
        format: MessageFormat,
        small_message: &str,
    ) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages AS m (conversation_id, user_id_from, full_message, full_message_format, small_message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING m.id, m.conversation_id, m.user_id_from, m.subject, m.full_message,
                      m.full_message_format, m.small_message, m.time_created
            "#,
        )
        .bind(conversation_id)
        .bind(user_id_from)
        .bind(full_message)
        .bind(format.code())
        .bind(small_message)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => into_message(record),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23503") => Err(AppError::NotFound),
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Finds a message by id.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: i64) -> Result<Option<Message>> {
        let record =
            sqlx::query_as::<_, MessageRecord>(&format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = $1"))
                .bind(id)
                .fetch_optional(conn)
                .await?;

        record.map(into_message).transpose()
    }

    /// Records a per-user action. Returns false if the action already existed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn insert_action(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        message_id: i64,
        action: MessageAction,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_user_actions (user_id, message_id, action)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, message_id, action) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(message_id)
        .bind(action.code())
        .execute(conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a read action unless one exists. Returns the stored read time, so marking a
    /// message read again leaves the first time in place.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert or lookup fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_read(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        message_id: i64,
        time_read: OffsetDateTime,
    ) -> Result<OffsetDateTime> {
        sqlx::query(
            r#"
            INSERT INTO message_user_actions (user_id, message_id, action, time_created)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, message_id, action) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(message_id)
        .bind(MessageAction::Read.code())
        .bind(time_read)
        .execute(&mut *conn)
        .await?;

        let stored: OffsetDateTime = sqlx::query_scalar(
            "SELECT time_created FROM message_user_actions WHERE user_id = $1 AND message_id = $2 AND action = $3",
        )
        .bind(user_id)
        .bind(message_id)
        .bind(MessageAction::Read.code())
        .fetch_one(conn)
        .await?;

        Ok(stored)
    }

    /// Soft-deletes a message for every current member of its conversation lacking a deletion.
    /// Returns the number of actions inserted.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_for_all_members(&self, conn: &mut PgConnection, message_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_user_actions (user_id, message_id, action)
            SELECT mem.user_id, m.id, $2
            FROM messages m
            JOIN message_conversation_members mem ON mem.conversation_id = m.conversation_id
            WHERE m.id = $1
            ON CONFLICT (user_id, message_id, action) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(MessageAction::Deleted.code())
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Soft-deletes every message of a conversation for a single user.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_conversation_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_user_actions (user_id, message_id, action)
            SELECT $1, m.id, $3 FROM messages m WHERE m.conversation_id = $2
            ON CONFLICT (user_id, message_id, action) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(MessageAction::Deleted.code())
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks every unread message not sent by the user as read, across all of the user's
    /// conversations or only the given one.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_all_read(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: Option<i64>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO message_user_actions (user_id, message_id, action)
            SELECT mem.user_id, m.id, $3
            FROM message_conversation_members mem
            JOIN messages m ON m.conversation_id = mem.conversation_id
            WHERE mem.user_id = $1
              AND m.user_id_from <> $1
              AND ($2::INT8 IS NULL OR mem.conversation_id = $2)
            ON CONFLICT (user_id, message_id, action) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(MessageAction::Read.code())
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Messages of a conversation visible to the user, windowed and paged as requested.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_for_conversation(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        conversation_id: i64,
        query: &MessageQuery,
    ) -> Result<Vec<Message>> {
        let direction = query.sort.sql();
        let limit = (query.limit_num > 0).then_some(query.limit_num);

        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            WHERE m.conversation_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_user_actions a
                  WHERE a.message_id = m.id AND a.user_id = $2 AND a.action = $3
              )
              AND ($4::TIMESTAMPTZ IS NULL OR m.time_created >= $4)
              AND ($5::TIMESTAMPTZ IS NULL OR m.time_created <= $5)
            ORDER BY m.time_created {direction}, m.id {direction}
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(conversation_id)
        .bind(user_id)
        .bind(MessageAction::Deleted.code())
        .bind(query.time_from)
        .bind(query.time_to)
        .bind(limit)
        .bind(query.limit_from.max(0))
        .fetch_all(conn)
        .await?;

        records.into_iter().map(into_message).collect()
    }

    /// Latest message of a conversation the user has not deleted.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_most_recent(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
        user_id: i64,
    ) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages m
            WHERE m.conversation_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_user_actions a
                  WHERE a.message_id = m.id AND a.user_id = $2 AND a.action = $3
              )
            ORDER BY m.time_created DESC, m.id DESC
            LIMIT 1
            "#
        ))
        .bind(conversation_id)
        .bind(user_id)
        .bind(MessageAction::Deleted.code())
        .fetch_optional(conn)
        .await?;

        record.map(into_message).transpose()
    }

    /// Number of enabled conversations holding at least one message from someone else
    /// that the user has not read.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_unread_conversations(&self, conn: &mut PgConnection, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT m.conversation_id)
            FROM message_conversation_members mem
            JOIN message_conversations c ON c.id = mem.conversation_id
            JOIN messages m ON m.conversation_id = c.id
            WHERE mem.user_id = $1
              AND c.enabled
              AND m.user_id_from <> $1
              AND NOT EXISTS (
                  SELECT 1 FROM message_user_actions a
                  WHERE a.message_id = m.id AND a.user_id = $1 AND a.action = $2
              )
            "#,
        )
        .bind(user_id)
        .bind(MessageAction::Read.code())
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    /// Fetches the next page of messages for the search indexer, ordered by `(xact_id, id)`.
    ///
    /// Only messages inserted by transactions older than every transaction still running are
    /// returned. Anything committed later therefore sorts after the last returned position.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn fetch_index_batch(
        &self,
        conn: &mut PgConnection,
        cursor: Option<IndexCursor>,
        limit: i64,
    ) -> Result<Vec<IndexableMessage>> {
        let records = sqlx::query_as::<_, IndexableMessageRecord>(
            r#"
            SELECT m.id, m.conversation_id, m.user_id_from, m.full_message,
                   COALESCE(
                       array_agg(mem.user_id ORDER BY mem.user_id) FILTER (WHERE mem.user_id IS NOT NULL),
                       '{}'::BIGINT[]
                   ) AS member_ids,
                   m.time_created, m.xact_id
            FROM messages m
            LEFT JOIN message_conversation_members mem ON mem.conversation_id = m.conversation_id
            WHERE m.xact_id < pg_snapshot_xmin(pg_current_snapshot())::TEXT::BIGINT
              AND ($1::INT8 IS NULL OR (m.xact_id, m.id) > ($1, $2))
            GROUP BY m.id
            ORDER BY m.xact_id ASC, m.id ASC
            LIMIT $3
            "#,
        )
        .bind(cursor.map(|c| c.xact_id))
        .bind(cursor.map_or(0, |c| c.id))
        .bind(limit)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Most recent message matching `query` in each enabled conversation of the user,
    /// newest match first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, query))]
    pub(crate) async fn search(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        query: &str,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<MessageSearchRecord>> {
        let records = sqlx::query_as::<_, MessageSearchRecord>(
            r#"
            SELECT matches.*
            FROM (
                SELECT DISTINCT ON (m.conversation_id)
                       m.id, m.conversation_id, c.type, c.name AS conversation_name, m.user_id_from,
                       u.first_name AS from_first_name, u.last_name AS from_last_name,
                       (SELECT o.user_id FROM message_conversation_members o
                        WHERE o.conversation_id = c.id AND o.user_id <> $1 AND c.type = 1
                        LIMIT 1) AS other_user_id,
                       m.small_message,
                       EXISTS (
                           SELECT 1 FROM message_users_blocked b
                           WHERE b.user_id = $1 AND b.blocked_user_id = m.user_id_from
                       ) AS is_blocked,
                       m.time_created
                FROM message_conversation_members mem
                JOIN message_conversations c ON c.id = mem.conversation_id
                JOIN messages m ON m.conversation_id = c.id
                JOIN users u ON u.id = m.user_id_from
                WHERE mem.user_id = $1
                  AND c.enabled
                  AND m.full_message ILIKE $2 ESCAPE '\'
                  AND NOT EXISTS (
                      SELECT 1 FROM message_user_actions a
                      WHERE a.message_id = m.id AND a.user_id = $1 AND a.action = $3
                  )
                ORDER BY m.conversation_id, m.time_created DESC, m.id DESC
            ) matches
            ORDER BY matches.time_created DESC, matches.id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(contains_pattern(query))
        .bind(MessageAction::Deleted.code())
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        Ok(records)
    }

    /// Removes every per-user action on the messages of a conversation.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_actions_for_conversation(
        &self,
        conn: &mut PgConnection,
        conversation_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_user_actions a
            USING messages m
            WHERE a.message_id = m.id AND m.conversation_id = $1
            "#,
        )
        .bind(conversation_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Hard-deletes the messages of a conversation. Their actions must already be gone.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_for_conversation(&self, conn: &mut PgConnection, conversation_id: i64) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM messages WHERE conversation_id = $1").bind(conversation_id).execute(conn).await?;
        Ok(result.rows_affected())
    }
}

pub(crate) fn into_message(record: MessageRecord) -> Result<Message> {
    Message::try_from(record).map_err(|e| {
        tracing::error!(error = %e, "Database data corruption: invalid message row");
        AppError::Internal
    })
}
