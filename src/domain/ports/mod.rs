use crate::domain::models::{
    event::{Event, EventSummary}, registration::Registration, user::User,
    password_reset::PasswordResetToken, notification::Notification,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> Result<Event, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Event>, AppError>;
    /// Removes the event together with its registrations and tag links.
    async fn delete(&self, id: &str) -> Result<(), AppError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<EventSummary>, AppError>;
    async fn interest_tags(&self, user_id: &str) -> Result<Vec<String>, AppError>;
    async fn upcoming_matching_tags(&self, user_id: &str, tags: &[String], now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError>;
    async fn upcoming_by_popularity(&self, user_id: &str, now: DateTime<Utc>, limit: i64) -> Result<Vec<EventSummary>, AppError>;
}

/// `register` and `unregister` run count, check and write as one transaction
/// holding the event's write lock; admission is decided by
/// `ledger::check_admission` / `ledger::check_release` inside it.
#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    async fn register(&self, registration: &Registration, now: DateTime<Utc>) -> Result<Registration, AppError>;
    async fn unregister(&self, event_id: &str, user_id: &str, now: DateTime<Utc>) -> Result<(), AppError>;
    async fn count_for_event(&self, event_id: &str) -> Result<i64, AppError>;
    async fn find(&self, event_id: &str, user_id: &str) -> Result<Option<Registration>, AppError>;
    async fn list_by_event(&self, event_id: &str) -> Result<Vec<Registration>, AppError>;
    async fn set_attended(&self, event_id: &str, user_id: &str, attended: bool) -> Result<bool, AppError>;
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Marks every unused token of the owner as used and stores `token`, atomically.
    /// Returns how many tokens were invalidated.
    async fn issue(&self, token: &PasswordResetToken) -> Result<u64, AppError>;
    /// Burns the token and stores the new password hash in one transaction.
    /// Returns the owning user id.
    async fn consume(&self, token_hash: &str, new_password_hash: &str, now: DateTime<Utc>) -> Result<String, AppError>;
    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<PasswordResetToken>, AppError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), AppError>;
}
