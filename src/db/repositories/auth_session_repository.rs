use sqlx::{Error, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::models::{AuthSession, User};

pub struct AuthSessionRepository;

impl AuthSessionRepository {
    pub async fn create_session(
        pool: &PgPool,
        user_id: i32,
        expires_at: OffsetDateTime,
    ) -> Result<AuthSession, Error> {
        sqlx::query_as::<_, AuthSession>(
            r#"
            INSERT INTO auth_sessions (token, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING token, user_id, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Owner of a live session token; expired tokens resolve to nothing.
    pub async fn find_user_by_token(pool: &PgPool, token: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.password_hash, u.name, u.email, u.role,
                   u.subscription_status, u.created_at
            FROM auth_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_session(pool: &PgPool, token: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM auth_sessions WHERE token = $1")
            .bind(token)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(pool: &PgPool) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
