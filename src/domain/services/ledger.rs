use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::domain::models::{
    event::{Event, EventSummary},
    notification::{Notification, NotificationPurpose},
    registration::Registration,
    user::User,
};
use crate::domain::ports::{Clock, EventRepository, Notifier, RegistrationRepository, UserRepository};
use crate::domain::services::rate_limiter::{RateAction, RateIdentity, RateLimiter};
use crate::error::AppError;

/// Admission rule for a new registration, evaluated against state read inside
/// the registering transaction. Order matters: the first failing check wins.
pub fn check_admission(event: &Event, seats_taken: i64, already_registered: bool, now: DateTime<Utc>) -> Result<(), AppError> {
    if event.has_started(now) {
        return Err(AppError::AlreadyStarted);
    }
    if !has_free_seat(event, seats_taken) {
        return Err(AppError::EventFull);
    }
    if already_registered {
        return Err(AppError::AlreadyRegistered);
    }
    Ok(())
}

pub fn check_release(event: &Event, registered: bool, now: DateTime<Utc>) -> Result<(), AppError> {
    if event.has_started(now) {
        return Err(AppError::AlreadyStarted);
    }
    if !registered {
        return Err(AppError::NotRegistered);
    }
    Ok(())
}

pub fn has_free_seat(event: &Event, seats_taken: i64) -> bool {
    match event.max_seats {
        Some(max) => seats_taken < i64::from(max),
        None => true,
    }
}

pub fn remaining_seats(event: &Event, seats_taken: i64) -> Option<i64> {
    event.max_seats.map(|max| (i64::from(max) - seats_taken).max(0))
}

pub struct RegistrationLedger {
    events: Arc<dyn EventRepository>,
    registrations: Arc<dyn RegistrationRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn Notifier>,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl RegistrationLedger {
    pub fn new(
        events: Arc<dyn EventRepository>,
        registrations: Arc<dyn RegistrationRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn Notifier>,
        rate_limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { events, registrations, users, notifier, rate_limiter, clock }
    }

    pub async fn register(&self, event_id: &str, user_id: &str) -> Result<Registration, AppError> {
        let now = self.clock.now();
        let registration = self.registrations.register(&Registration::new(event_id, user_id, now), now).await?;
        info!(event_id = %event_id, user_id = %user_id, "event_registered");

        self.send_confirmation(event_id, user_id).await;
        Ok(registration)
    }

    pub async fn unregister(&self, event_id: &str, user_id: &str) -> Result<(), AppError> {
        let now = self.clock.now();
        self.registrations.unregister(event_id, user_id, now).await?;
        info!(event_id = %event_id, user_id = %user_id, "event_unregistered");
        Ok(())
    }

    pub async fn seats_taken(&self, event_id: &str) -> Result<i64, AppError> {
        self.registrations.count_for_event(event_id).await
    }

    /// `Ok(None)` for events without a seat limit.
    pub async fn available_seats(&self, event_id: &str) -> Result<Option<i64>, AppError> {
        let event = self.load_event(event_id).await?;
        let taken = self.registrations.count_for_event(event_id).await?;
        Ok(remaining_seats(&event, taken))
    }

    pub async fn my_events(&self, user_id: &str) -> Result<Vec<EventSummary>, AppError> {
        self.events.list_for_user(user_id).await
    }

    pub async fn participants(&self, event_id: &str, organizer_id: &str) -> Result<Vec<Registration>, AppError> {
        let event = self.load_event(event_id).await?;
        ensure_owner(&event, organizer_id)?;
        self.registrations.list_by_event(event_id).await
    }

    pub async fn set_attendance(&self, event_id: &str, organizer_id: &str, user_id: &str, attended: bool) -> Result<(), AppError> {
        let event = self.load_event(event_id).await?;
        ensure_owner(&event, organizer_id)?;

        if !self.registrations.set_attended(event_id, user_id, attended).await? {
            return Err(AppError::NotFound("Registration not found".into()));
        }
        info!(event_id = %event_id, user_id = %user_id, owner_id = %organizer_id, attended, "attendance_updated");
        Ok(())
    }

    pub async fn resend_confirmation(&self, event_id: &str, user_id: &str) -> Result<(), AppError> {
        let user = self.users.find_by_id(user_id).await?
            .ok_or(AppError::NotFound(format!("User {} not found", user_id)))?;
        self.rate_limiter.enforce(RateAction::ResendConfirmation, &RateIdentity::resolve(Some(&user.email), user_id))?;

        let event = self.load_event(event_id).await?;
        if self.registrations.find(event_id, user_id).await?.is_none() {
            return Err(AppError::NotRegistered);
        }
        self.dispatch(&user, &event).await;
        Ok(())
    }

    async fn load_event(&self, event_id: &str) -> Result<Event, AppError> {
        self.events.find_by_id(event_id).await?
            .ok_or(AppError::NotFound(format!("Event {} not found", event_id)))
    }

    // Registration is already committed here; notification problems are only logged.
    async fn send_confirmation(&self, event_id: &str, user_id: &str) {
        let lookup = async {
            let user = self.users.find_by_id(user_id).await?;
            let event = self.events.find_by_id(event_id).await?;
            Ok::<_, AppError>(user.zip(event))
        };
        match lookup.await {
            Ok(Some((user, event))) => self.dispatch(&user, &event).await,
            Ok(None) => warn!(event_id = %event_id, user_id = %user_id, "Skipping confirmation, user or event vanished"),
            Err(e) => warn!(event_id = %event_id, user_id = %user_id, "Skipping confirmation: {}", e),
        }
    }

    async fn dispatch(&self, user: &User, event: &Event) {
        let notification = Notification {
            recipient: user.email.clone(),
            purpose: NotificationPurpose::RegistrationConfirmed,
            context: json!({
                "user_id": user.id,
                "user_name": user.display_name(),
                "event_id": event.id,
                "event_title": event.title,
                "start_time": event.start_time,
                "location": event.location,
            }),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.notifier.dispatch(notification).await {
            warn!(event_id = %event.id, user_id = %user.id, "Failed to hand off confirmation: {}", e);
        }
    }
}

fn ensure_owner(event: &Event, organizer_id: &str) -> Result<(), AppError> {
    if event.owner_id != organizer_id {
        return Err(AppError::Forbidden("Only the event owner can manage participants".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(max_seats: Option<i32>, starts_in: Duration) -> Event {
        let now = Utc::now();
        Event {
            id: "e1".into(),
            owner_id: "o1".into(),
            title: "Talk".into(),
            location: String::new(),
            start_time: now + starts_in,
            end_time: None,
            max_seats,
            status: "PUBLISHED".into(),
            created_at: now,
            tags: vec![],
        }
    }

    #[test]
    fn test_started_wins_over_full() {
        let e = event(Some(1), Duration::hours(-1));
        assert!(matches!(check_admission(&e, 1, true, Utc::now()), Err(AppError::AlreadyStarted)));
    }

    #[test]
    fn test_full_wins_over_duplicate() {
        let e = event(Some(2), Duration::hours(1));
        assert!(matches!(check_admission(&e, 2, true, Utc::now()), Err(AppError::EventFull)));
        assert!(matches!(check_admission(&e, 1, true, Utc::now()), Err(AppError::AlreadyRegistered)));
        assert!(check_admission(&e, 1, false, Utc::now()).is_ok());
    }

    #[test]
    fn test_unlimited_capacity() {
        let e = event(None, Duration::hours(1));
        assert!(has_free_seat(&e, 10_000));
        assert_eq!(remaining_seats(&e, 10_000), None);
        assert_eq!(remaining_seats(&event(Some(5), Duration::hours(1)), 3), Some(2));
    }

    #[test]
    fn test_release_rules() {
        let upcoming = event(Some(1), Duration::hours(1));
        assert!(matches!(check_release(&upcoming, false, Utc::now()), Err(AppError::NotRegistered)));
        assert!(check_release(&upcoming, true, Utc::now()).is_ok());
        let past = event(Some(1), Duration::hours(-1));
        assert!(matches!(check_release(&past, true, Utc::now()), Err(AppError::AlreadyStarted)));
    }
}
