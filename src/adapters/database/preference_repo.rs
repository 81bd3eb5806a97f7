use crate::error::Result;
use sqlx::PgConnection;

/// Raw `(user, name) -> value` preference storage.
#[derive(Clone, Debug, Default)]
pub struct PreferenceRepository {}

impl PreferenceRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn get(&self, conn: &mut PgConnection, user_id: i64, name: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM user_preferences WHERE user_id = $1 AND name = $2")
                .bind(user_id)
                .bind(name)
                .fetch_optional(conn)
                .await?;
        Ok(value)
    }

    /// # Errors
    /// Returns `AppError::Database` if the upsert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, value))]
    pub(crate) async fn set(&self, conn: &mut PgConnection, user_id: i64, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, name, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(value)
        .execute(conn)
        .await?;
        Ok(())
    }
}
