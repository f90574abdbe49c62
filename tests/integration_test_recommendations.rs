mod common;

use chrono::Duration;
use common::TestApp;
use eventlink_core::domain::services::recommendations::Tier;

fn ids(recs: &eventlink_core::domain::services::recommendations::Recommendations) -> Vec<String> {
    recs.events.iter().map(|s| s.event.id.clone()).collect()
}

#[tokio::test]
async fn test_new_user_gets_popular_events() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let newcomer = app.create_user("new@test.ro").await;

    let quiet = app.create_event(&owner, Duration::days(1), Some(10), &[]).await;
    let busy = app.create_event(&owner, Duration::days(3), Some(10), &[]).await;
    let medium = app.create_event(&owner, Duration::days(2), Some(10), &[]).await;

    for i in 0..3 {
        let u = app.create_user(&format!("b{}@test.ro", i)).await;
        app.state.ledger.register(&busy.id, &u.id).await.unwrap();
    }
    let u = app.create_user("m@test.ro").await;
    app.state.ledger.register(&medium.id, &u.id).await.unwrap();

    let recs = app.state.recommender.recommend(&newcomer.id).await.unwrap();
    assert_eq!(recs.tier, Tier::Popularity);
    assert_eq!(ids(&recs), vec![busy.id.clone(), medium.id.clone(), quiet.id.clone()]);
    assert_eq!(recs.events[0].seats_taken, 3);
}

#[tokio::test]
async fn test_popularity_ties_broken_by_start_time() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let newcomer = app.create_user("new@test.ro").await;

    let late = app.create_event(&owner, Duration::days(4), None, &[]).await;
    let early = app.create_event(&owner, Duration::days(1), None, &[]).await;

    let recs = app.state.recommender.recommend(&newcomer.id).await.unwrap();
    assert_eq!(ids(&recs), vec![early.id, late.id]);
}

#[tokio::test]
async fn test_tag_matches_come_first_in_start_order() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let student = app.create_user("student@test.ro").await;

    let attended = app.create_event(&owner, Duration::days(1), Some(10), &["Python"]).await;
    app.state.ledger.register(&attended.id, &student.id).await.unwrap();

    let py_late = app.create_event(&owner, Duration::days(6), Some(10), &["python", "web"]).await;
    let py_early = app.create_event(&owner, Duration::days(2), Some(10), &["PYTHON"]).await;
    let popular_other = app.create_event(&owner, Duration::days(1), Some(10), &["music"]).await;
    for i in 0..4 {
        let u = app.create_user(&format!("fan{}@test.ro", i)).await;
        app.state.ledger.register(&popular_other.id, &u.id).await.unwrap();
    }

    let recs = app.state.recommender.recommend(&student.id).await.unwrap();
    assert_eq!(recs.tier, Tier::TagMatch);
    assert_eq!(ids(&recs), vec![py_early.id, py_late.id]);
    assert!(!ids(&recs).contains(&attended.id));
}

#[tokio::test]
async fn test_falls_back_when_no_tag_overlap() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let student = app.create_user("student@test.ro").await;

    let attended = app.create_event(&owner, Duration::days(1), Some(10), &["chess"]).await;
    app.state.ledger.register(&attended.id, &student.id).await.unwrap();
    let other = app.create_event(&owner, Duration::days(2), Some(10), &["music"]).await;

    let recs = app.state.recommender.recommend(&student.id).await.unwrap();
    assert_eq!(recs.tier, Tier::Popularity);
    assert_eq!(ids(&recs), vec![other.id]);
}

#[tokio::test]
async fn test_past_events_are_never_recommended() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let student = app.create_user("student@test.ro").await;

    let soon = app.create_event(&owner, Duration::hours(1), None, &["ai"]).await;
    let later = app.create_event(&owner, Duration::days(3), None, &["ai"]).await;
    app.clock.advance(Duration::hours(2));

    let recs = app.state.recommender.recommend(&student.id).await.unwrap();
    assert_eq!(ids(&recs), vec![later.id]);
    assert!(!ids(&recs).contains(&soon.id));
}

#[tokio::test]
async fn test_full_events_filtered_without_backfill() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let newcomer = app.create_user("new@test.ro").await;

    // Ten full single-seat events outrank everything else on popularity.
    let mut full = Vec::new();
    for i in 0..10 {
        let event = app.create_event(&owner, Duration::days(1) + Duration::minutes(i), Some(1), &[]).await;
        let u = app.create_user(&format!("taker{}@test.ro", i)).await;
        app.state.ledger.register(&event.id, &u.id).await.unwrap();
        full.push(event.id);
    }
    let open = app.create_event(&owner, Duration::days(2), Some(5), &[]).await;

    let recs = app.state.recommender.recommend(&newcomer.id).await.unwrap();
    assert_eq!(recs.tier, Tier::Popularity);
    assert!(recs.events.is_empty(), "the open event sits outside the 10-candidate window");
    assert!(!ids(&recs).contains(&open.id));
}

#[tokio::test]
async fn test_limit_and_exclusions() {
    let app = TestApp::new().await;
    let owner = app.create_organizer("org@test.ro").await;
    let student = app.create_user("student@test.ro").await;

    let mine = app.create_event(&owner, Duration::days(1), Some(20), &["rust"]).await;
    app.state.ledger.register(&mine.id, &student.id).await.unwrap();

    let mut tagged = Vec::new();
    for i in 0..12 {
        tagged.push(app.create_event(&owner, Duration::days(2) + Duration::hours(i), Some(20), &["rust"]).await.id);
    }
    let full_tagged = app.create_event(&owner, Duration::hours(30), Some(1), &["rust"]).await;
    let taker = app.create_user("taker@test.ro").await;
    app.state.ledger.register(&full_tagged.id, &taker.id).await.unwrap();

    let recs = app.state.recommender.recommend(&student.id).await.unwrap();
    assert_eq!(recs.tier, Tier::TagMatch);
    // The full event is the earliest candidate, so it uses up a slot before being filtered.
    assert_eq!(ids(&recs), tagged[..9].to_vec());
    assert!(recs.events.iter().all(|s| s.event.tags.contains(&"rust".to_string())));
}
