use serde::Serialize;
use serde_json::Value;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPurpose {
    RegistrationConfirmed,
    PasswordReset,
}

/// A request for the mail collaborator to send something. The core never renders or delivers it.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub purpose: NotificationPurpose,
    pub context: Value,
    pub created_at: DateTime<Utc>,
}
