use serde::Serialize;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Stored form of a reset token. Only the SHA-256 of the opaque string is persisted.
#[derive(Debug, Serialize, FromRow, Clone)]
pub struct PasswordResetToken {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at >= now
    }
}

/// Returned once at issuance. The raw token never touches the store.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub record: PasswordResetToken,
}
