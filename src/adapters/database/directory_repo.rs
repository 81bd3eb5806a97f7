use crate::adapters::database::contains_pattern;
use crate::adapters::database::records::{CourseGroupRecord, UserRecord};
use crate::domain::capability::{Capability, Scope};
use crate::domain::user::User;
use crate::error::Result;
use sqlx::PgConnection;

const USER_COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name, u.deleted, u.time_created";

/// Read access to the user, enrolment, capability and course group tables.
#[derive(Clone, Debug, Default)]
pub struct DirectoryRepository {}

impl DirectoryRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Users matching `ids`. Unknown ids are skipped.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, ids), fields(count = ids.len()))]
    pub(crate) async fn find_users(&self, conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users u WHERE u.id = ANY($1) ORDER BY u.id"
        ))
        .bind(ids)
        .fetch_all(conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Whether a non-deleted user with this id exists.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn user_exists(&self, conn: &mut PgConnection, id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND NOT deleted)")
            .bind(id)
            .fetch_one(conn)
            .await?;
        Ok(exists)
    }

    /// Explicit grant for a capability. A course grant overrides the system grant.
    /// `None` means no grant row applies.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(capability = %capability))]
    pub(crate) async fn find_grant(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        capability: Capability,
        scope: Scope,
    ) -> Result<Option<bool>> {
        let allowed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT allowed
            FROM capability_grants
            WHERE user_id = $1
              AND capability = $2
              AND (course_id IS NULL OR course_id = $3)
            ORDER BY (course_id IS NULL) ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(capability.name())
        .bind(scope.course_id())
        .fetch_optional(conn)
        .await?;
        Ok(allowed)
    }

    /// Whether two users are enrolled in at least one common course.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn shares_course(&self, conn: &mut PgConnection, user_a: i64, user_b: i64) -> Result<bool> {
        let shared: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM course_enrolments a
                JOIN course_enrolments b ON b.course_id = a.course_id
                WHERE a.user_id = $1 AND b.user_id = $2
            )
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_one(conn)
        .await?;
        Ok(shared)
    }

    /// Contacts of `user_id` whose name or username contains `query`.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, query))]
    pub(crate) async fn search_contacts(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        query: &str,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            WHERE u.id <> $1
              AND NOT u.deleted
              AND ((u.first_name || ' ' || u.last_name) ILIKE $2 ESCAPE '\' OR u.username ILIKE $2 ESCAPE '\')
              AND EXISTS (
                  SELECT 1 FROM message_contacts mc
                  WHERE (mc.user_id = $1 AND mc.contact_id = u.id) OR (mc.user_id = u.id AND mc.contact_id = $1)
              )
            ORDER BY u.first_name, u.last_name, u.id
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(contains_pattern(query))
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Non-contacts of `user_id` whose name or username contains `query`. Unless
    /// `everyone_visible`, only users sharing a course with `user_id` are returned.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn, query))]
    pub(crate) async fn search_noncontacts(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        query: &str,
        everyone_visible: bool,
        limit_from: i64,
        limit_num: Option<i64>,
    ) -> Result<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users u
            WHERE u.id <> $1
              AND NOT u.deleted
              AND ((u.first_name || ' ' || u.last_name) ILIKE $2 ESCAPE '\' OR u.username ILIKE $2 ESCAPE '\')
              AND NOT EXISTS (
                  SELECT 1 FROM message_contacts mc
                  WHERE (mc.user_id = $1 AND mc.contact_id = u.id) OR (mc.user_id = u.id AND mc.contact_id = $1)
              )
              AND ($3 OR EXISTS (
                  SELECT 1
                  FROM course_enrolments a
                  JOIN course_enrolments b ON b.course_id = a.course_id
                  WHERE a.user_id = $1 AND b.user_id = u.id
              ))
            ORDER BY u.first_name, u.last_name, u.id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(contains_pattern(query))
        .bind(everyone_visible)
        .bind(limit_num)
        .bind(limit_from)
        .fetch_all(conn)
        .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Course name and picture of a course group.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_course_group(
        &self,
        conn: &mut PgConnection,
        group_id: i64,
    ) -> Result<Option<CourseGroupRecord>> {
        let record = sqlx::query_as::<_, CourseGroupRecord>(
            r#"
            SELECT c.full_name AS course_full_name, g.picture_url
            FROM course_groups g
            JOIN courses c ON c.id = g.course_id
            WHERE g.id = $1
            "#,
        )
        .bind(group_id)
        .fetch_optional(conn)
        .await?;
        Ok(record)
    }
}
