use crate::domain::{
    models::{event::Event, registration::Registration},
    ports::RegistrationRepository,
    services::ledger::{check_admission, check_release},
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};

pub struct SqliteRegistrationRepo {
    pool: SqlitePool,
}

impl SqliteRegistrationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Opens a transaction whose first statement is a write on the event row, so
/// the database write lock is held before anything is read. Every writer to
/// the same event queues here instead of failing on a stale snapshot.
async fn lock_event(pool: &SqlitePool, event_id: &str) -> Result<(Transaction<'static, Sqlite>, Event), AppError> {
    let mut tx = pool.begin().await.map_err(AppError::Database)?;
    let touched = sqlx::query("UPDATE events SET id = id WHERE id = ?").bind(event_id).execute(&mut *tx).await.map_err(AppError::Database)?;
    if touched.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Event {} not found", event_id)));
    }
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?").bind(event_id).fetch_one(&mut *tx).await.map_err(AppError::Database)?;
    Ok((tx, event))
}

#[async_trait]
impl RegistrationRepository for SqliteRegistrationRepo {
    async fn register(&self, registration: &Registration, now: DateTime<Utc>) -> Result<Registration, AppError> {
        let (mut tx, event) = lock_event(&self.pool, &registration.event_id).await?;

        let seats_taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = ?")
            .bind(&registration.event_id).fetch_one(&mut *tx).await.map_err(AppError::Database)?;
        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM registrations WHERE event_id = ? AND user_id = ?")
            .bind(&registration.event_id).bind(&registration.user_id).fetch_optional(&mut *tx).await.map_err(AppError::Database)?;

        check_admission(&event, seats_taken, existing.is_some(), now)?;

        let created = sqlx::query_as::<_, Registration>(
            "INSERT INTO registrations (id, user_id, event_id, registered_at, attended)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&registration.id).bind(&registration.user_id).bind(&registration.event_id)
            .bind(registration.registered_at).bind(registration.attended)
            .fetch_one(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    async fn unregister(&self, event_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let (mut tx, event) = lock_event(&self.pool, event_id).await?;

        let existing: Option<String> = sqlx::query_scalar("SELECT id FROM registrations WHERE event_id = ? AND user_id = ?")
            .bind(event_id).bind(user_id).fetch_optional(&mut *tx).await.map_err(AppError::Database)?;

        check_release(&event, existing.is_some(), now)?;

        sqlx::query("DELETE FROM registrations WHERE event_id = ? AND user_id = ?").bind(event_id).bind(user_id).execute(&mut *tx).await.map_err(AppError::Database)?;
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn count_for_event(&self, event_id: &str) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = ?").bind(event_id).fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE event_id = ? AND user_id = ?").bind(event_id).bind(user_id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Registration>, AppError> {
        sqlx::query_as::<_, Registration>("SELECT * FROM registrations WHERE event_id = ? ORDER BY registered_at ASC, id ASC").bind(event_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn set_attended(&self, event_id: &str, user_id: &str, attended: bool) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE registrations SET attended = ? WHERE event_id = ? AND user_id = ?").bind(attended).bind(event_id).bind(user_id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
