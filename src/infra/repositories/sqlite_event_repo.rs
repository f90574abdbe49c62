use crate::domain::{models::event::{Event, EventSummary}, ports::EventRepository};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const SUMMARY_SELECT: &str =
    "SELECT e.*, (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id) AS seats_taken FROM events e";

pub struct SqliteEventRepo {
    pool: SqlitePool,
}

impl SqliteEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn tags_for(&self, event_id: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>("SELECT tag FROM event_tags WHERE event_id = ? ORDER BY tag")
            .bind(event_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn with_tags(&self, mut rows: Vec<EventSummary>) -> Result<Vec<EventSummary>, AppError> {
        for row in rows.iter_mut() {
            row.event.tags = self.tags_for(&row.event.id).await?;
        }
        Ok(rows)
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepo {
    async fn create(&self, event: &Event) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        let mut created = sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, owner_id, title, location, start_time, end_time, max_seats, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&event.id).bind(&event.owner_id).bind(&event.title).bind(&event.location)
            .bind(event.start_time).bind(event.end_time).bind(event.max_seats)
            .bind(&event.status).bind(event.created_at)
            .fetch_one(&mut *tx).await.map_err(AppError::Database)?;

        for tag in &event.tags {
            sqlx::query("INSERT INTO event_tags (event_id, tag) VALUES (?, ?)").bind(&event.id).bind(tag).execute(&mut *tx).await.map_err(AppError::Database)?;
        }
        tx.commit().await.map_err(AppError::Database)?;

        created.tags = event.tags.clone();
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ?").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)?;
        match event {
            Some(mut event) => {
                event.tags = self.tags_for(&event.id).await?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM registrations WHERE event_id = ?").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM event_tags WHERE event_id = ?").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        let result = sqlx::query("DELETE FROM events WHERE id = ?").bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if result.rows_affected() == 0 { return Err(AppError::NotFound("Event not found".into())); }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EventSummary>, AppError> {
        let rows = sqlx::query_as::<_, EventSummary>(&format!(
            "{} WHERE e.id IN (SELECT event_id FROM registrations WHERE user_id = ?) ORDER BY e.start_time ASC, e.id ASC",
            SUMMARY_SELECT
        ))
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }

    async fn interest_tags(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT et.tag FROM event_tags et
             JOIN registrations r ON r.event_id = et.event_id
             WHERE r.user_id = ?
             ORDER BY et.tag"
        )
            .bind(user_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn upcoming_matching_tags(&self, user_id: &str, tags: &[String], now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SUMMARY_SELECT);
        qb.push(" WHERE e.start_time >= ").push_bind(now);
        qb.push(" AND e.id NOT IN (SELECT event_id FROM registrations WHERE user_id = ").push_bind(user_id.to_string()).push(")");
        qb.push(" AND EXISTS (SELECT 1 FROM event_tags et WHERE et.event_id = e.id AND et.tag IN (");
        let mut in_list = qb.separated(", ");
        for tag in tags {
            in_list.push_bind(tag.to_lowercase());
        }
        in_list.push_unseparated("))");
        qb.push(" ORDER BY e.start_time ASC, e.id ASC LIMIT ").push_bind(limit);

        let rows = qb.build_query_as::<EventSummary>().fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }

    async fn upcoming_by_popularity(&self, user_id: &str, now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        let rows = sqlx::query_as::<_, EventSummary>(&format!(
            "{} WHERE e.start_time >= ?
               AND e.id NOT IN (SELECT event_id FROM registrations WHERE user_id = ?)
             ORDER BY seats_taken DESC, e.start_time ASC, e.id ASC
             LIMIT ?",
            SUMMARY_SELECT
        ))
            .bind(now).bind(user_id).bind(limit)
            .fetch_all(&self.pool).await.map_err(AppError::Database)?;
        self.with_tags(rows).await
    }
}
