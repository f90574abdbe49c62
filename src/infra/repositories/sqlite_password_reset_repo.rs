use crate::domain::{models::password_reset::PasswordResetToken, ports::PasswordResetRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqlitePasswordResetRepo {
    pool: SqlitePool,
}

impl SqlitePasswordResetRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetRepository for SqlitePasswordResetRepo {
    async fn issue(&self, token: &PasswordResetToken) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        // Write first so concurrent issuers for the same user serialize on the write lock.
        let owner = sqlx::query("UPDATE users SET id = id WHERE id = ?").bind(&token.user_id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if owner.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", token.user_id)));
        }

        let invalidated = sqlx::query("UPDATE password_reset_tokens SET used = 1 WHERE user_id = ? AND used = 0")
            .bind(&token.user_id).execute(&mut *tx).await.map_err(AppError::Database)?
            .rows_affected();

        sqlx::query("INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used, created_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(&token.id).bind(&token.user_id).bind(&token.token_hash)
            .bind(token.expires_at).bind(token.used).bind(token.created_at)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(invalidated)
    }

    async fn consume(&self, token_hash: &str, new_password_hash: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let burned: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            "UPDATE password_reset_tokens SET used = 1 WHERE token_hash = ? AND used = 0 RETURNING user_id, expires_at"
        )
            .bind(token_hash).fetch_optional(&mut *tx).await.map_err(AppError::Database)?;

        // Dropping `tx` on the error paths rolls the burn back.
        let (user_id, expires_at) = burned.ok_or(AppError::InvalidOrExpiredToken)?;
        if expires_at < now {
            return Err(AppError::InvalidOrExpiredToken);
        }

        let updated = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?").bind(new_password_hash).bind(&user_id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidOrExpiredToken);
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(user_id)
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE (used = 1 AND created_at <= ?) OR expires_at < ?")
            .bind(cutoff).bind(cutoff).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PasswordResetToken>, AppError> {
        sqlx::query_as::<_, PasswordResetToken>("SELECT * FROM password_reset_tokens WHERE user_id = ? ORDER BY created_at ASC, id ASC")
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
}
