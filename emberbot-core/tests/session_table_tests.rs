// File: emberbot-core/tests/session_table_tests.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::time::sleep;

use emberbot_common::models::CallbackToken;
use emberbot_core::cache::SessionTable;

fn token_for(session_id: &str) -> CallbackToken {
    CallbackToken::new("trig", session_id).unwrap()
}

#[tokio::test]
async fn create_then_get_returns_the_session() {
    let table = SessionTable::default();
    let session = table.create(vec!["deploy prod".into(), "prod".into()]);

    let fetched = table.get(&token_for(&session.session_id)).unwrap();
    assert_eq!(fetched.session_id, session.session_id);
    assert_eq!(fetched.matched, vec!["deploy prod", "prod"]);
    assert!(fetched.value.is_empty());
}

#[tokio::test]
async fn session_ids_are_unique() {
    let table = SessionTable::default();
    let a = table.create(vec![]);
    let b = table.create(vec![]);
    assert_ne!(a.session_id, b.session_id);
}

#[tokio::test]
async fn expired_session_is_unreachable() {
    let table = SessionTable::new(ChronoDuration::milliseconds(50));
    let session = table.create(vec![]);
    let token = token_for(&session.session_id);

    assert!(table.get(&token).is_some());
    sleep(Duration::from_millis(90)).await;
    assert!(table.get(&token).is_none());
}

#[tokio::test]
async fn update_refreshes_the_deadline() {
    let table = SessionTable::new(ChronoDuration::milliseconds(200));
    let mut session = table.create(vec![]);
    let token = token_for(&session.session_id);

    sleep(Duration::from_millis(120)).await;
    session.value = "prod".into();
    table.update(&token, session.clone());

    // Past the original deadline, within the refreshed one.
    sleep(Duration::from_millis(120)).await;
    let fetched = table.get(&token).unwrap();
    assert_eq!(fetched.value, "prod");

    sleep(Duration::from_millis(250)).await;
    assert!(table.get(&token).is_none());
}

#[tokio::test]
async fn prune_drops_only_expired_entries() {
    let table = SessionTable::new(ChronoDuration::milliseconds(60));
    let old = table.create(vec![]);
    sleep(Duration::from_millis(90)).await;
    let fresh = table.create(vec![]);

    table.prune_expired();
    assert_eq!(table.len(), 1);
    assert!(table.get(&token_for(&old.session_id)).is_none());
    assert!(table.get(&token_for(&fresh.session_id)).is_some());
}

#[tokio::test]
async fn prune_survives_concurrent_creates() {
    // Inserts landing while the sweep runs must not trip up its removal
    // accounting; with a tiny TTL nearly everything it sees is expired.
    let table = Arc::new(SessionTable::new(ChronoDuration::milliseconds(1)));

    let writer = {
        let table = table.clone();
        std::thread::spawn(move || {
            for _ in 0..20_000 {
                table.create(vec![]);
            }
        })
    };
    let sweeper = {
        let table = table.clone();
        std::thread::spawn(move || {
            for _ in 0..2_000 {
                table.prune_expired();
            }
        })
    };

    writer.join().unwrap();
    sweeper.join().expect("sweep must not panic under concurrent creates");

    sleep(Duration::from_millis(10)).await;
    table.prune_expired();
    assert!(table.is_empty());
}

#[tokio::test]
async fn unknown_session_is_none() {
    let table = SessionTable::default();
    assert!(table.get(&token_for("nope")).is_none());
}
