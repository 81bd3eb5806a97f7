use crate::adapters::database::records::{BlockedUserRecord, ContactRecord, ContactRequestRecord, UserRecord};
use crate::domain::contact::{BlockedUser, Contact, ContactRequest};
use crate::domain::user::User;
use crate::error::Result;
use sqlx::PgConnection;

/// Contacts, pending contact requests and user blocks.
#[derive(Clone, Debug, Default)]
pub struct ContactRepository {}

impl ContactRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Finds the contact row linking two users, stored in either direction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_contact(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        other_id: i64,
    ) -> Result<Option<Contact>> {
        let record = sqlx::query_as::<_, ContactRecord>(
            r#"
            SELECT id, user_id, contact_id, time_created
            FROM message_contacts
            WHERE (user_id = $1 AND contact_id = $2) OR (user_id = $2 AND contact_id = $1)
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Inserts a contact row. The caller checks for an existing row in the other direction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn insert_contact(&self, conn: &mut PgConnection, user_id: i64, contact_id: i64) -> Result<Contact> {
        let record = sqlx::query_as::<_, ContactRecord>(
            r#"
            INSERT INTO message_contacts AS c (user_id, contact_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, contact_id) DO UPDATE SET user_id = c.user_id
            RETURNING c.id, c.user_id, c.contact_id, c.time_created
            "#,
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Removes the contact between two users in both directions.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_contact(&self, conn: &mut PgConnection, user_id: i64, other_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_contacts
            WHERE (user_id = $1 AND contact_id = $2) OR (user_id = $2 AND contact_id = $1)
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// A page of the user's contacts, ordered by name.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_contacts(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT u.id, u.username, u.first_name, u.last_name, u.deleted, u.time_created
            FROM message_contacts mc
            JOIN users u ON u.id = CASE WHEN mc.user_id = $1 THEN mc.contact_id ELSE mc.user_id END
            WHERE (mc.user_id = $1 OR mc.contact_id = $1) AND NOT u.deleted
            ORDER BY u.first_name, u.last_name, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Counts the user's contacts.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_contacts(&self, conn: &mut PgConnection, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM message_contacts mc
            JOIN users u ON u.id = CASE WHEN mc.user_id = $1 THEN mc.contact_id ELSE mc.user_id END
            WHERE (mc.user_id = $1 OR mc.contact_id = $1) AND NOT u.deleted
            "#,
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }

    /// Ids among `other_ids` that are contacts of the user.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, other_ids), fields(count = other_ids.len()))]
    pub(crate) async fn find_contact_ids(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        other_ids: &[i64],
    ) -> Result<Vec<i64>> {
        if other_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT CASE WHEN user_id = $1 THEN contact_id ELSE user_id END
            FROM message_contacts
            WHERE (user_id = $1 AND contact_id = ANY($2)) OR (contact_id = $1 AND user_id = ANY($2))
            "#,
        )
        .bind(user_id)
        .bind(other_ids)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }

    /// Finds the pending request from `user_id` to `requested_user_id`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_request(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        requested_user_id: i64,
    ) -> Result<Option<ContactRequest>> {
        let record = sqlx::query_as::<_, ContactRequestRecord>(
            r#"
            SELECT id, user_id, requested_user_id, time_created
            FROM message_contact_requests
            WHERE user_id = $1 AND requested_user_id = $2
            "#,
        )
        .bind(user_id)
        .bind(requested_user_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Inserts a pending request, returning the existing one for the same ordered pair.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the upsert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn insert_request(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        requested_user_id: i64,
    ) -> Result<ContactRequest> {
        let record = sqlx::query_as::<_, ContactRequestRecord>(
            r#"
            INSERT INTO message_contact_requests AS r (user_id, requested_user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, requested_user_id) DO UPDATE SET user_id = r.user_id
            RETURNING r.id, r.user_id, r.requested_user_id, r.time_created
            "#,
        )
        .bind(user_id)
        .bind(requested_user_id)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Deletes the pending request from `user_id` to `requested_user_id`.
    /// Returns false when there was none.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_request(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        requested_user_id: i64,
    ) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM message_contact_requests WHERE user_id = $1 AND requested_user_id = $2")
                .bind(user_id)
                .bind(requested_user_id)
                .execute(conn)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A page of requests received by the user, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_received_requests(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<ContactRequest>> {
        let records = sqlx::query_as::<_, ContactRequestRecord>(
            r#"
            SELECT r.id, r.user_id, r.requested_user_id, r.time_created
            FROM message_contact_requests r
            JOIN users u ON u.id = r.user_id
            WHERE r.requested_user_id = $1 AND NOT u.deleted
            ORDER BY r.time_created ASC, r.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Counts the requests received by the user, skipping those from users who are now blocked.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_received_requests(&self, conn: &mut PgConnection, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM message_contact_requests r
            JOIN users u ON u.id = r.user_id
            WHERE r.requested_user_id = $1
              AND NOT u.deleted
              AND NOT EXISTS (
                  SELECT 1 FROM message_users_blocked b
                  WHERE b.user_id = $1 AND b.blocked_user_id = r.user_id
              )
            "#,
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;
        Ok(count)
    }

    /// Pending requests between two users in either direction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_requests_between(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        other_id: i64,
    ) -> Result<Vec<ContactRequest>> {
        let records = sqlx::query_as::<_, ContactRequestRecord>(
            r#"
            SELECT id, user_id, requested_user_id, time_created
            FROM message_contact_requests
            WHERE (user_id = $1 AND requested_user_id = $2) OR (user_id = $2 AND requested_user_id = $1)
            ORDER BY time_created ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Records that `user_id` blocked `blocked_user_id`, returning the existing block if any.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the upsert fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn insert_block(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        blocked_user_id: i64,
    ) -> Result<BlockedUser> {
        let record = sqlx::query_as::<_, BlockedUserRecord>(
            r#"
            INSERT INTO message_users_blocked AS b (user_id, blocked_user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, blocked_user_id) DO UPDATE SET user_id = b.user_id
            RETURNING b.id, b.user_id, b.blocked_user_id, b.time_created
            "#,
        )
        .bind(user_id)
        .bind(blocked_user_id)
        .fetch_one(conn)
        .await?;

        Ok(record.into())
    }

    /// Lifts a block. Returns false when there was none.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn delete_block(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        blocked_user_id: i64,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM message_users_blocked WHERE user_id = $1 AND blocked_user_id = $2")
            .bind(user_id)
            .bind(blocked_user_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether `user_id` has blocked `blocked_user_id`. Directed.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn is_blocked(&self, conn: &mut PgConnection, user_id: i64, blocked_user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM message_users_blocked WHERE user_id = $1 AND blocked_user_id = $2)",
        )
        .bind(user_id)
        .bind(blocked_user_id)
        .fetch_one(conn)
        .await?;
        Ok(exists)
    }

    /// Blocks recorded by the user, newest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_blocked(&self, conn: &mut PgConnection, user_id: i64) -> Result<Vec<BlockedUser>> {
        let records = sqlx::query_as::<_, BlockedUserRecord>(
            r#"
            SELECT b.id, b.user_id, b.blocked_user_id, b.time_created
            FROM message_users_blocked b
            JOIN users u ON u.id = b.blocked_user_id
            WHERE b.user_id = $1 AND NOT u.deleted
            ORDER BY b.time_created DESC, b.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Ids among `other_ids` the user has blocked.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, other_ids), fields(count = other_ids.len()))]
    pub(crate) async fn find_blocked_ids(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        other_ids: &[i64],
    ) -> Result<Vec<i64>> {
        if other_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT blocked_user_id FROM message_users_blocked WHERE user_id = $1 AND blocked_user_id = ANY($2)",
        )
        .bind(user_id)
        .bind(other_ids)
        .fetch_all(conn)
        .await?;
        Ok(ids)
    }
}
