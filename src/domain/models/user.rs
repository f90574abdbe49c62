use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const ROLE_STUDENT: &str = "STUDENT";
pub const ROLE_ORGANIZER: &str = "ORGANIZER";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, full_name: Option<String>, password_hash: String, role: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            full_name,
            password_hash,
            role: role.to_string(),
            created_at: now,
        }
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
