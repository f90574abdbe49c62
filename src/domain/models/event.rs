use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use crate::error::AppError;

pub const STATUS_PUBLISHED: &str = "PUBLISHED";
pub const STATUS_DRAFT: &str = "DRAFT";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// `None` means unlimited seats.
    pub max_seats: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub owner_id: String,
    pub title: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub max_seats: Option<i32>,
    pub tags: Vec<String>,
    pub status: String,
}

impl Event {
    pub fn new(params: NewEvent, now: DateTime<Utc>) -> Result<Self, AppError> {
        if params.title.trim().is_empty() {
            return Err(AppError::Validation("Event title must not be empty".into()));
        }
        if let Some(seats) = params.max_seats
            && seats <= 0
        {
            return Err(AppError::Validation("max_seats must be positive".into()));
        }
        if let Some(end) = params.end_time
            && end < params.start_time
        {
            return Err(AppError::Validation("Event cannot end before it starts".into()));
        }
        if params.status != STATUS_PUBLISHED && params.status != STATUS_DRAFT {
            return Err(AppError::Validation(format!("Unknown event status {}", params.status)));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            owner_id: params.owner_id,
            title: params.title.trim().to_string(),
            location: params.location,
            start_time: params.start_time,
            end_time: params.end_time,
            max_seats: params.max_seats,
            status: params.status,
            created_at: now,
            tags: normalize_tags(&params.tags),
        })
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time < now
    }
}

/// Trims, lowercases and deduplicates tag labels, dropping empty ones.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut tags: Vec<String> = raw
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// An event together with its live seat count.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct EventSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub seats_taken: i64,
}
