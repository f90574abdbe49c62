use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub registered_at: DateTime<Utc>,
    pub attended: bool,
}

impl Registration {
    pub fn new(event_id: &str, user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            registered_at: now,
            attended: false,
        }
    }
}
