//! Handle database requests for the credential store.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::user::{ExternalLogin, User};

const USER_COLUMNS: &str = r#"id, email, username, first_name, last_name,
    password, lockout_enabled, failed_access_count, lockout_end, created_at"#;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert [`User`] into database.
    pub async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users (id, email, username, first_name, last_name,
                password, lockout_enabled, failed_access_count, lockout_end, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password)
        .bind(user.lockout_enabled)
        .bind(user.failed_access_count)
        .bind(user.lockout_end)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find a user using the `id` field.
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user using the `email` field.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find the user linked to an external identity.
    pub async fn find_by_external_login(
        &self,
        provider: &str,
        provider_key: &str,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                u.password, u.lockout_enabled, u.failed_access_count,
                u.lockout_end, u.created_at
                FROM users u
                JOIN external_logins l ON l.user_id = u.id
                WHERE l.provider = $1 AND l.provider_key = $2"#,
        )
        .bind(provider)
        .bind(provider_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Link an external identity to a user.
    ///
    /// Linking an already-linked `(provider, provider_key)` pair is a
    /// no-op, not an error.
    pub async fn add_external_login(&self, link: &ExternalLogin) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO external_logins (provider, provider_key, user_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (provider, provider_key) DO NOTHING"#,
        )
        .bind(&link.provider)
        .bind(&link.provider_key)
        .bind(link.user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record one failed access attempt.
    ///
    /// Reaching `max_failed` stamps the lockout window and resets the
    /// counter. Returns the resulting counter and lockout end.
    pub async fn record_access_failure(
        &self,
        user_id: Uuid,
        max_failed: i32,
        lockout_until: DateTime<Utc>,
    ) -> Result<(i32, Option<DateTime<Utc>>)> {
        let row = sqlx::query(
            r#"UPDATE users SET
                failed_access_count = CASE
                    WHEN failed_access_count + 1 >= $2 THEN 0
                    ELSE failed_access_count + 1 END,
                lockout_end = CASE
                    WHEN failed_access_count + 1 >= $2 THEN $3
                    ELSE lockout_end END
                WHERE id = $1
                RETURNING failed_access_count, lockout_end"#,
        )
        .bind(user_id)
        .bind(max_failed)
        .bind(lockout_until)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("failed_access_count"), row.get("lockout_end")))
    }

    /// Reset the failed access counter after a successful sign-in.
    pub async fn reset_access_failures(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET failed_access_count = 0 WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Whether the database rejected the statement on a unique constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}
