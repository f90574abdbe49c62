use crate::domain::{models::event::{Event, EventSummary}, ports::EventRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const SUMMARY_SELECT: &str =
    "SELECT e.*, (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id) AS seats_taken FROM events e";

pub struct PostgresEventRepo {
    pool: PgPool,
}

impl PostgresEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_tags(&self, mut rows: Vec<EventSummary>) -> Result<Vec<EventSummary>, AppError> {
        if rows.is_empty() {
            return Ok(rows);
        }
        let ids: Vec<String> = rows.iter().map(|r| r.event.id.clone()).collect();
        let links: Vec<(String, String)> = sqlx::query_as("SELECT event_id, tag FROM event_tags WHERE event_id = ANY($1) ORDER BY tag")
            .bind(&ids).fetch_all(&self.pool).await.map_err(AppError::Database)?;

        for row in rows.iter_mut() {
            row.event.tags = links.iter().filter(|(id, _)| *id == row.event.id).map(|(_, tag)| tag.clone()).collect();
        }
        Ok(rows)
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepo {
    async fn create(&self, event: &Event) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let mut created = sqlx::query_as::<_, Event>("INSERT INTO events (id, owner_id, title, location, start_time, end_time, max_seats, status, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *")
            .bind(&event.id).bind(&event.owner_id).bind(&event.title).bind(&event.location)
            .bind(event.start_time).bind(event.end_time).bind(event.max_seats)
            .bind(&event.status).bind(event.created_at)
            .fetch_one(&mut *tx).await.map_err(AppError::Database)?;

        if !event.tags.is_empty() {
            sqlx::query("INSERT INTO event_tags (event_id, tag) SELECT $1, UNNEST($2::TEXT[])")
                .bind(&event.id).bind(&event.tags).execute(&mut *tx).await.map_err(AppError::Database)?;
        }
        tx.commit().await.map_err(AppError::Database)?;

        created.tags = event.tags.clone();
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)?;
        match event {
            Some(mut event) => {
                event.tags = sqlx::query_scalar("SELECT tag FROM event_tags WHERE event_id = $1 ORDER BY tag")
                    .bind(id).fetch_all(&self.pool).await.map_err(AppError::Database)?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM registrations WHERE event_id = $1").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM event_tags WHERE event_id = $1").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        let result = sqlx::query("DELETE FROM events WHERE id = $1").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if result.rows_affected() == 0 { return Err(AppError::NotFound("Event not found".into())); }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EventSummary>, AppError> {
        let rows = sqlx::query_as::<_, EventSummary>(&format!(
            "{} WHERE e.id IN (SELECT event_id FROM registrations WHERE user_id = $1) ORDER BY e.start_time ASC, e.id ASC",
            SUMMARY_SELECT
        ))
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }

    async fn interest_tags(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar("SELECT DISTINCT et.tag FROM event_tags et JOIN registrations r ON r.event_id = et.event_id WHERE r.user_id = $1 ORDER BY et.tag")
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn upcoming_matching_tags(&self, user_id: &str, tags: &[String], now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let tags: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
        let rows = sqlx::query_as::<_, EventSummary>(&format!(
            "{} WHERE e.start_time >= $1
               AND e.id NOT IN (SELECT event_id FROM registrations WHERE user_id = $2)
               AND EXISTS (SELECT 1 FROM event_tags et WHERE et.event_id = e.id AND et.tag = ANY($3))
             ORDER BY e.start_time ASC, e.id ASC
             LIMIT $4",
            SUMMARY_SELECT
        ))
            .bind(now).bind(user_id).bind(&tags).bind(limit)
            .fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }

    async fn upcoming_by_popularity(&self, user_id: &str, now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        let rows = sqlx::query_as::<_, EventSummary>(&format!(
            "{} WHERE e.start_time >= $1
               AND e.id NOT IN (SELECT event_id FROM registrations WHERE user_id = $2)
             ORDER BY seats_taken DESC, e.start_time ASC, e.id ASC
             LIMIT $3",
            SUMMARY_SELECT
        ))
            .bind(now).bind(user_id).bind(limit)
            .fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }
}
