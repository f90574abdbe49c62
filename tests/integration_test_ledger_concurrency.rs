mod common;

use chrono::Duration;
use common::TestApp;
use eventlink_core::{
    domain::models::{event::{Event, NewEvent, STATUS_PUBLISHED}, user::{User, ROLE_ORGANIZER, ROLE_STUDENT}},
    domain::ports::Clock,
    domain::services::credentials::hash_password,
    error::AppError,
    infra::{clock::ManualClock, factory::{connect_postgres, postgres_repositories}},
    state::AppState,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_concurrent_registrations_respect_capacity() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let capacity = 5;
    let attempts = 20;
    let event = app.create_event(&owner, Duration::days(1), Some(capacity), &[]).await;

    let mut users = Vec::new();
    for i in 0..attempts {
        users.push(app.create_user(&format!("racer{}@test.ro", i)).await);
    }

    let mut set = JoinSet::new();
    for user in users {
        let state = app.state.clone();
        let event_id = event.id.clone();
        set.spawn(async move { state.ledger.register(&event_id, &user.id).await });
    }

    let mut ok = 0;
    let mut full = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) => ok += 1,
            Err(AppError::EventFull) => full += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(ok, capacity as usize);
    assert_eq!(full, attempts - capacity as usize);
    assert_eq!(app.state.ledger.seats_taken(&event.id).await.unwrap(), capacity as i64);
}

#[tokio::test]
async fn test_concurrent_duplicate_registration_admits_one() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let student = app.create_user("student@test.ro").await;
    let event = app.create_event(&owner, Duration::days(1), Some(50), &[]).await;

    let mut set = JoinSet::new();
    for _ in 0..10 {
        let state = app.state.clone();
        let event_id = event.id.clone();
        let user_id = student.id.clone();
        set.spawn(async move { state.ledger.register(&event_id, &user_id).await });
    }

    let mut ok = 0;
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) => ok += 1,
            Err(AppError::AlreadyRegistered) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(app.state.ledger.seats_taken(&event.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_registrations_across_events() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let a = app.create_event(&owner, Duration::days(1), Some(3), &[]).await;
    let b = app.create_event(&owner, Duration::days(1), Some(3), &[]).await;

    let mut set = JoinSet::new();
    for i in 0..8 {
        let user = app.create_user(&format!("u{}@test.ro", i)).await;
        for event_id in [a.id.clone(), b.id.clone()] {
            let state = app.state.clone();
            let user_id = user.id.clone();
            set.spawn(async move { state.ledger.register(&event_id, &user_id).await });
        }
    }
    while let Some(res) = set.join_next().await {
        match res.unwrap() {
            Ok(_) | Err(AppError::EventFull) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(app.state.ledger.seats_taken(&a.id).await.unwrap(), 3);
    assert_eq!(app.state.ledger.seats_taken(&b.id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_postgres_capacity_race() {
    let db_url = match std::env::var("DATABASE_URL") {
        Ok(url) if url.starts_with("postgres") => url,
        _ => {
            println!("Skipping Postgres capacity race (DATABASE_URL is not Postgres)");
            return;
        }
    };

    let pool = connect_postgres(&db_url).await.expect("Failed to connect to Postgres");
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut config = eventlink_core::config::Config::from_env().unwrap();
    config.mail_service_url = None;
    let state = Arc::new(AppState::new(
        config,
        postgres_repositories(pool.clone()),
        clock.clone(),
        Arc::new(common::RecordingNotifier::default()),
    ));

    let suffix = uuid::Uuid::new_v4();
    let now = clock.now();
    let owner = state.user_repo.create(&User::new(&format!("org-{}@race.test", suffix), None, hash_password("organizer123").unwrap(), ROLE_ORGANIZER, now)).await.unwrap();
    let event = Event::new(NewEvent {
        owner_id: owner.id.clone(),
        title: "Race".into(),
        location: String::new(),
        start_time: now + Duration::days(1),
        end_time: None,
        max_seats: Some(4),
        tags: vec![],
        status: STATUS_PUBLISHED.into(),
    }, now).unwrap();
    let event = state.event_repo.create(&event).await.unwrap();

    let mut set = JoinSet::new();
    for i in 0..25 {
        let user = state.user_repo.create(&User::new(&format!("s{}-{}@race.test", i, suffix), None, "x".into(), ROLE_STUDENT, now)).await.unwrap();
        let state = state.clone();
        let event_id = event.id.clone();
        set.spawn(async move { state.ledger.register(&event_id, &user.id).await });
    }

    let mut ok = 0;
    while let Some(res) = set.join_next().await {
        if res.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 4);
    assert_eq!(state.ledger.seats_taken(&event.id).await.unwrap(), 4);

    state.event_repo.delete(&event.id).await.unwrap();
}
