use crate::domain::{models::password_reset::PasswordResetToken, ports::PasswordResetRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresPasswordResetRepo {
    pool: PgPool,
}

impl PostgresPasswordResetRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for PostgresPasswordResetRepo {
    async fn issue(&self, token: &PasswordResetToken) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // The user row lock serializes issuers even when no prior token exists to lock.
        let owner: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(&token.user_id).fetch_optional(&mut *tx).await.map_err(AppError::Database)?;
        if owner.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", token.user_id)));
        }

        let invalidated = sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE user_id = $1 AND used = FALSE")
            .bind(&token.user_id).execute(&mut *tx).await.map_err(AppError::Database)?
            .rows_affected();

        sqlx::query("INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(&token.id).bind(&token.user_id).bind(&token.token_hash)
            .bind(token.expires_at).bind(token.used).bind(token.created_at)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(invalidated)
    }

    async fn consume(&self, token_hash: &str, new_password_hash: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // A concurrent consumer blocks on the row lock, then re-checks `used` and matches nothing.
        let burned: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "UPDATE password_reset_tokens SET used = TRUE WHERE token_hash = $1 AND used = FALSE RETURNING user_id, expires_at"
        )
            .bind(token_hash).fetch_optional(&mut *tx).await.map_err(AppError::Database)?;

        let (user_id, expires_at) = burned.ok_or(AppError::InvalidOrExpiredToken)?;
        if expires_at < now {
            return Err(AppError::InvalidOrExpiredToken);
        }

        let updated = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2").bind(new_password_hash).bind(&user_id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidOrExpiredToken);
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(user_id)
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE (used = TRUE AND created_at <= $1) OR expires_at < $1")
            .bind(cutoff).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PasswordResetToken>, AppError> {
        sqlx::query_as::<_, PasswordResetToken>("SELECT * FROM password_reset_tokens WHERE user_id = $1 ORDER BY created_at ASC, id ASC")
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
}
