use eventlink_core::{
    config::Config,
    domain::models::{
        event::{Event, NewEvent, STATUS_PUBLISHED},
        notification::Notification,
        user::{User, ROLE_ORGANIZER, ROLE_STUDENT},
    },
    domain::ports::{Clock, Notifier},
    domain::services::credentials::hash_password,
    domain::services::rate_limiter::RateLimitConfig,
    domain::services::schedule::LocalSchedule,
    error::AppError,
    infra::{clock::ManualClock, factory::{connect_sqlite, sqlite_repositories}},
    state::AppState,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{Pool, Sqlite};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[allow(dead_code)]
pub struct TestApp {
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limits(RateLimitConfig::default()).await
    }

    pub async fn with_rate_limits(rate_limits: RateLimitConfig) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let pool = connect_sqlite(&db_url).await.expect("Failed to prepare test db");

        let config = Config {
            database_url: db_url,
            mail_service_url: None,
            mail_service_token: String::new(),
            frontend_url: "http://frontend.test".to_string(),
            reset_token_ttl: Duration::hours(1),
            purge_interval: std::time::Duration::from_millis(50),
            purge_retention: Duration::zero(),
            rate_limits,
            log_dir: "./logs".to_string(),
        };

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 1, 15, 12, 0, 0).unwrap()));
        let notifier = Arc::new(RecordingNotifier::default());

        let state = Arc::new(AppState::new(
            config,
            sqlite_repositories(pool.clone()),
            clock.clone(),
            notifier.clone(),
        ));

        Self { pool, db_filename, state, clock, notifier }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_user(&self, email: &str) -> User {
        self.create_user_with_role(email, ROLE_STUDENT, "initial123").await
    }

    pub async fn create_organizer(&self, email: &str) -> User {
        self.create_user_with_role(email, ROLE_ORGANIZER, "organizer123").await
    }

    pub async fn create_user_with_role(&self, email: &str, role: &str, password: &str) -> User {
        let user = User::new(email, None, hash_password(password).unwrap(), role, self.now());
        self.state.user_repo.create(&user).await.unwrap()
    }

    /// Creates a published event starting `starts_in` from the test clock.
    pub async fn create_event(&self, owner: &User, starts_in: Duration, max_seats: Option<i32>, tags: &[&str]) -> Event {
        let params = NewEvent {
            owner_id: owner.id.clone(),
            title: format!("Event {}", Uuid::new_v4()),
            location: "Hall A".to_string(),
            start_time: self.now() + starts_in,
            end_time: None,
            max_seats,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            status: STATUS_PUBLISHED.to_string(),
        };
        let event = Event::new(params, self.now()).unwrap();
        self.state.event_repo.create(&event).await.unwrap()
    }

    /// Creates a published event from the organizer's local wall-clock schedule.
    pub async fn create_local_event(&self, owner: &User, schedule: &LocalSchedule, max_seats: Option<i32>) -> Result<Event, AppError> {
        let params = schedule.apply(NewEvent {
            owner_id: owner.id.clone(),
            title: format!("Event {}", Uuid::new_v4()),
            location: "Hall B".to_string(),
            start_time: self.now(),
            end_time: None,
            max_seats,
            tags: vec![],
            status: STATUS_PUBLISHED.to_string(),
        })?;
        let event = Event::new(params, self.now())?;
        self.state.event_repo.create(&event).await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
