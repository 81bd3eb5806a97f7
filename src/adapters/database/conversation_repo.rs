use crate::adapters::database::records::{
    ConversationCountRecord, ConversationListRecord, ConversationRecord, SharedConversationRecord,
};
use crate::domain::conversation::{Conversation, ConversationArea, ConversationHash, ConversationType, NewConversation};
use crate::domain::favourite::CONVERSATION_FAVOURITES;
use crate::error::{AppError, Result};
use sqlx::PgConnection;

const CONVERSATION_COLUMNS: &str = "c.id, c.type, c.name, c.conv_hash, c.enabled, c.component, c.item_type, \
                                    c.item_id, c.context_id, c.time_created, c.time_modified";

/// Listing filters applied to a user's conversations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationFilter {
    pub r#type: Option<ConversationType>,
    /// `Some(true)` keeps only favourites, `Some(false)` drops them.
    pub favourites: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct ConversationRepository {}

impl ConversationRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a conversation row. Members are added separately.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails, including unique violations on the hash.
    #[tracing::instrument(level = "debug", skip(self, conn, params), fields(conversation_type = %params.r#type))]
    pub(crate) async fn create(
        &self,
        conn: &mut PgConnection,
        params: &NewConversation,
        hash: Option<&ConversationHash>,
    ) -> Result<Conversation> {
        let area = params.area.as_ref();
        let record = sqlx::query_as::<_, ConversationRecord>(
            r#"
            INSERT INTO message_conversations AS c
                (type, name, conv_hash, enabled, component, item_type, item_id, context_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING c.id, c.type, c.name, c.conv_hash, c.enabled, c.component, c.item_type,
                      c.item_id, c.context_id, c.time_created, c.time_modified
            "#,
        )
        .bind(params.r#type.code())
        .bind(params.name.as_deref())
        .bind(hash.map(ConversationHash::as_str))
        .bind(params.enabled)
        .bind(area.map(|a| a.component.as_str()))
        .bind(area.map(|a| a.item_type.as_str()))
        .bind(area.map(|a| a.item_id))
        .bind(area.map(|a| a.context_id))
        .fetch_one(conn)
        .await?;

        into_conversation(record)
    }

    /// Finds a conversation by id.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut PgConnection, id: i64) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM message_conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        record.map(into_conversation).transpose()
    }

    /// Finds the individual or self conversation with the given participant hash.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(hash = %hash))]
    pub(crate) async fn find_by_hash(
        &self,
        conn: &mut PgConnection,
        hash: &ConversationHash,
    ) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM message_conversations c WHERE c.conv_hash = $1"
        ))
        .bind(hash.as_str())
        .fetch_optional(conn)
        .await?;

        record.map(into_conversation).transpose()
    }

    /// Finds the conversation linked to an external area.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_area(
        &self,
        conn: &mut PgConnection,
        area: &ConversationArea,
    ) -> Result<Option<Conversation>> {
        let record = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM message_conversations c
            WHERE c.component = $1 AND c.item_type = $2 AND c.item_id = $3 AND c.context_id = $4
            ORDER BY c.id ASC
            LIMIT 1
            "#
        ))
        .bind(&area.component)
        .bind(&area.item_type)
        .bind(area.item_id)
        .bind(area.context_id)
        .fetch_optional(conn)
        .await?;

        record.map(into_conversation).transpose()
    }

    /// Sets the enabled flag. Returns false when the conversation does not exist.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn set_enabled(&self, conn: &mut PgConnection, id: i64, enabled: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE message_conversations SET enabled = $2, time_modified = NOW() WHERE id = $1")
                .bind(id)
                .bind(enabled)
                .execute(conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Renames a conversation. Returns false when the conversation does not exist.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn, name))]
    pub(crate) async fn update_name(&self, conn: &mut PgConnection, id: i64, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE message_conversations SET name = $2, time_modified = NOW() WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the conversation row itself. Dependent rows must already be gone.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete(&self, conn: &mut PgConnection, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM message_conversations WHERE id = $1").bind(id).execute(conn).await?;
        Ok(result.rows_affected())
    }

    /// Enabled group conversations both users are members of, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_groups_between(
        &self,
        conn: &mut PgConnection,
        user_a: i64,
        user_b: i64,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<Conversation>> {
        let records = sqlx::query_as::<_, ConversationRecord>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM message_conversations c
            JOIN message_conversation_members ma ON ma.conversation_id = c.id AND ma.user_id = $1
            JOIN message_conversation_members mb ON mb.conversation_id = c.id AND mb.user_id = $2
            WHERE c.type = $3 AND c.enabled
            ORDER BY c.time_created DESC, c.id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_a)
        .bind(user_b)
        .bind(ConversationType::Group.code())
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        records.into_iter().map(into_conversation).collect()
    }

    /// Visible conversations shared between `user_id` and each of `other_ids`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, other_ids), fields(others = other_ids.len()))]
    pub(crate) async fn find_shared_with(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        other_ids: &[i64],
    ) -> Result<Vec<SharedConversationRecord>> {
        if other_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, SharedConversationRecord>(
            r#"
            SELECT o.user_id AS other_user_id, c.id, c.type, c.name
            FROM message_conversation_members me
            JOIN message_conversation_members o ON o.conversation_id = me.conversation_id
            JOIN message_conversations c ON c.id = me.conversation_id
            WHERE me.user_id = $1
              AND o.user_id = ANY($2)
              AND o.user_id <> $1
              AND c.enabled
            ORDER BY o.user_id, c.id
            "#,
        )
        .bind(user_id)
        .bind(other_ids)
        .fetch_all(conn)
        .await?;

        Ok(records)
    }

    /// Lists a user's conversations with last visible message, unread count and per-user flags.
    ///
    /// Individual conversations without a visible message are omitted from listings, but not
    /// when `only_conversation` asks for one directly. Conversations with messages come first
    /// by latest message, the rest by creation time.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        filter: ConversationFilter,
        only_conversation: Option<i64>,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<ConversationListRecord>> {
        let records = sqlx::query_as::<_, ConversationListRecord>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS},
                   (f.id IS NOT NULL) AS is_favourite,
                   (ca.id IS NOT NULL) AS is_muted,
                   (SELECT COUNT(*) FROM message_conversation_members mc WHERE mc.conversation_id = c.id)
                       AS member_count,
                   unread.total AS unread_count,
                   lm.id AS last_message_id,
                   lm.user_id_from AS last_user_id_from,
                   lm.subject AS last_subject,
                   lm.full_message AS last_full_message,
                   lm.full_message_format AS last_full_message_format,
                   lm.small_message AS last_small_message,
                   lm.time_created AS last_time_created
            FROM message_conversation_members mem
            JOIN message_conversations c ON c.id = mem.conversation_id
            LEFT JOIN favourites f
                   ON f.component = $2 AND f.item_type = $3 AND f.item_id = c.id AND f.user_id = mem.user_id
            LEFT JOIN message_conversation_actions ca
                   ON ca.conversation_id = c.id AND ca.user_id = mem.user_id AND ca.action = 1
            LEFT JOIN LATERAL (
                SELECT m.id, m.user_id_from, m.subject, m.full_message, m.full_message_format,
                       m.small_message, m.time_created
                FROM messages m
                WHERE m.conversation_id = c.id
                  AND NOT EXISTS (
                      SELECT 1 FROM message_user_actions a
                      WHERE a.message_id = m.id AND a.user_id = mem.user_id AND a.action = 2
                  )
                ORDER BY m.time_created DESC, m.id DESC
                LIMIT 1
            ) lm ON TRUE
            CROSS JOIN LATERAL (
                SELECT COUNT(*) AS total
                FROM messages m
                WHERE m.conversation_id = c.id
                  AND m.user_id_from <> mem.user_id
                  AND NOT EXISTS (
                      SELECT 1 FROM message_user_actions a
                      WHERE a.message_id = m.id AND a.user_id = mem.user_id AND a.action IN (1, 2)
                  )
            ) unread
            WHERE mem.user_id = $1
              AND c.enabled
              AND ($6::INT8 IS NOT NULL OR c.type <> 1 OR lm.id IS NOT NULL)
              AND ($4::INT4 IS NULL OR c.type = $4)
              AND ($5::BOOLEAN IS NULL OR (f.id IS NOT NULL) = $5)
              AND ($6::INT8 IS NULL OR c.id = $6)
            ORDER BY (lm.id IS NULL) ASC,
                     lm.time_created DESC NULLS LAST,
                     lm.id DESC NULLS LAST,
                     c.time_created DESC,
                     c.id DESC
            LIMIT $7 OFFSET $8
            "#
        ))
        .bind(user_id)
        .bind(CONVERSATION_FAVOURITES.component)
        .bind(CONVERSATION_FAVOURITES.item_type)
        .bind(filter.r#type.map(ConversationType::code))
        .bind(filter.favourites)
        .bind(only_conversation)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        Ok(records)
    }

    /// Counts the conversations `find_for_user` would list, grouped by type and favourite state.
    /// With `unread_only`, only conversations holding unread messages are counted.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_for_user(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<ConversationCountRecord>> {
        let records = sqlx::query_as::<_, ConversationCountRecord>(
            r#"
            SELECT c.type, (f.id IS NOT NULL) AS is_favourite, COUNT(DISTINCT c.id) AS total
            FROM message_conversation_members mem
            JOIN message_conversations c ON c.id = mem.conversation_id
            LEFT JOIN favourites f
                   ON f.component = $2 AND f.item_type = $3 AND f.item_id = c.id AND f.user_id = mem.user_id
            WHERE mem.user_id = $1
              AND c.enabled
              AND (c.type <> 1 OR EXISTS (
                  SELECT 1 FROM messages m
                  WHERE m.conversation_id = c.id
                    AND NOT EXISTS (
                        SELECT 1 FROM message_user_actions a
                        WHERE a.message_id = m.id AND a.user_id = mem.user_id AND a.action = 2
                    )
              ))
              AND (NOT $4 OR EXISTS (
                  SELECT 1 FROM messages m
                  WHERE m.conversation_id = c.id
                    AND m.user_id_from <> mem.user_id
                    AND NOT EXISTS (
                        SELECT 1 FROM message_user_actions a
                        WHERE a.message_id = m.id AND a.user_id = mem.user_id AND a.action IN (1, 2)
                    )
              ))
            GROUP BY c.type, (f.id IS NOT NULL)
            "#,
        )
        .bind(user_id)
        .bind(CONVERSATION_FAVOURITES.component)
        .bind(CONVERSATION_FAVOURITES.item_type)
        .bind(unread_only)
        .fetch_all(conn)
        .await?;

        Ok(records)
    }
}

pub(crate) fn into_conversation(record: ConversationRecord) -> Result<Conversation> {
    Conversation::try_from(record).map_err(|e| {
        tracing::error!(error = %e, "Database data corruption: invalid conversation row");
        AppError::Internal
    })
}
