//! Session store tests: caps, eviction, listing and concurrent access.

mod common;

use chrono::{TimeDelta, Utc};
use common::{ScriptedLauncher, idle_controller, idle_controller_with_limits};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use strictly_chess::{SessionError, SessionStatus, SessionStore};

#[test]
fn test_create_starts_in_initial_state() {
    let store = SessionStore::new(10, 10);
    let id = store.create().unwrap();
    let session = store.get(&id).unwrap();

    assert_eq!(session.id(), &id);
    assert_eq!(*session.status(), SessionStatus::AwaitingHuman);
    assert!(session.history().is_empty());
    assert_eq!(session.position().ply(), 0);
    assert!(session.result().is_none());
}

#[test]
fn test_remove_is_idempotent() {
    let store = SessionStore::new(10, 10);
    let id = store.create().unwrap();

    store.remove(&id);
    store.remove(&id);
    store.remove("never-existed");

    assert!(store.is_empty());
    assert!(matches!(store.get(&id), Err(SessionError::NotFound(_))));
}

#[test]
fn test_mutate_unknown_session_is_not_found() {
    let store = SessionStore::new(10, 10);
    let result = store.mutate("missing", |_| Ok(()));
    assert!(matches!(result, Err(SessionError::NotFound(_))));
}

#[test]
fn test_mutate_returns_transition_error() {
    let store = SessionStore::new(10, 10);
    let id = store.create().unwrap();
    let result: Result<(), _> =
        store.mutate(&id, |_| Err(SessionError::InvalidState("nope".to_string())));
    assert!(matches!(result, Err(SessionError::InvalidState(_))));
}

#[test]
fn test_concurrent_creates_produce_distinct_ids() {
    let store = Arc::new(SessionStore::new(100, 100));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..10)
                    .map(|_| store.create().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let ids: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let distinct: HashSet<&String> = ids.iter().collect();

    assert_eq!(ids.len(), 80);
    assert_eq!(distinct.len(), 80);
    assert_eq!(store.len(), 80);
}

#[test]
fn test_create_beyond_cap_is_refused() {
    let store = SessionStore::new(100, 80);
    for _ in 0..100 {
        store.create().unwrap();
    }

    let err = store.create().unwrap_err();
    assert_eq!(err, SessionError::ResourceExhausted(100));
    assert_eq!(store.len(), 100);
}

#[tokio::test]
async fn test_cap_evicts_finished_sessions_only() {
    let (controller, _queue) = idle_controller(ScriptedLauncher::new([]), 3);
    let finished = controller.create_session().unwrap().session_id;
    let thinking = controller.create_session().unwrap().session_id;
    let waiting = controller.create_session().unwrap().session_id;
    controller.resign(&finished).unwrap();
    controller.submit_move(&thinking, "e2e4").unwrap();

    let fresh = controller.create_session().unwrap().session_id;

    assert!(controller.get_state(&finished).is_err());
    assert!(controller.get_state(&thinking).is_ok());
    assert!(controller.get_state(&waiting).is_ok());
    assert!(controller.get_state(&fresh).is_ok());

    // active games are never evicted to make room
    assert!(matches!(
        controller.create_session(),
        Err(SessionError::ResourceExhausted(3))
    ));
}

#[test]
fn test_listing_is_newest_first() {
    let store = SessionStore::new(10, 10);
    let ids: Vec<String> = (0..5).map(|_| store.create().unwrap()).collect();

    let listing = store.list_all();
    assert_eq!(listing.len(), 5);
    let listed: Vec<String> = listing.map(|s| s.session_id).collect();

    let mut expected = ids;
    expected.reverse();
    assert_eq!(listed, expected);
}

#[test]
fn test_listing_is_a_snapshot() {
    let store = SessionStore::new(10, 10);
    store.create().unwrap();
    let listing = store.list_all();

    store.create().unwrap();
    assert_eq!(listing.count(), 1);
    assert_eq!(store.list_all().count(), 2);
}

#[test]
fn test_sweep_removes_sessions_past_max_age() {
    let store = SessionStore::new(10, 10);
    store.create().unwrap();
    store.create().unwrap();

    let removed = store.sweep(Utc::now(), Duration::from_secs(3600));
    assert!(removed.is_empty());

    let later = Utc::now() + TimeDelta::hours(2);
    let removed = store.sweep(later, Duration::from_secs(3600));
    assert_eq!(removed.len(), 2);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_sweep_over_soft_limit_removes_finished() {
    let (controller, _queue) = idle_controller_with_limits(ScriptedLauncher::new([]), 10, 2);
    let finished = controller.create_session().unwrap().session_id;
    let active = controller.create_session().unwrap().session_id;
    let thinking = controller.create_session().unwrap().session_id;
    controller.resign(&finished).unwrap();
    controller.submit_move(&thinking, "e2e4").unwrap();

    let removed = controller
        .store()
        .sweep(Utc::now(), Duration::from_secs(3600));

    assert_eq!(removed, vec![finished.clone()]);
    assert!(controller.get_state(&active).is_ok());
    assert!(controller.get_state(&thinking).is_ok());

    // at or under the soft limit finished sessions stay
    controller.resign(&active).unwrap();
    let removed = controller
        .store()
        .sweep(Utc::now(), Duration::from_secs(3600));
    assert!(removed.is_empty());
    assert_eq!(controller.store().counts().finished, 1);
}

#[tokio::test]
async fn test_counts_by_status() {
    let (controller, _queue) = idle_controller(ScriptedLauncher::new([]), 10);
    let a = controller.create_session().unwrap().session_id;
    let b = controller.create_session().unwrap().session_id;
    controller.create_session().unwrap();
    controller.resign(&a).unwrap();
    controller.submit_move(&b, "e2e4").unwrap();

    let counts = controller.store().counts();
    assert_eq!(counts.total, 3);
    assert_eq!(counts.finished, 1);
    assert_eq!(counts.engine_thinking, 1);
    assert_eq!(counts.awaiting_human, 1);
}

/// Holds the slot of `id` inside a `mutate` until `release` fires.
fn hold_session(
    store: &Arc<SessionStore>,
    id: &str,
) -> (std::thread::JoinHandle<()>, std::sync::mpsc::Sender<()>) {
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let store = Arc::clone(store);
    let id = id.to_string();
    let holder = std::thread::spawn(move || {
        store
            .mutate(&id, |_| {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(())
            })
            .unwrap();
    });
    entered_rx.recv().unwrap();
    (holder, release_tx)
}

#[test]
fn test_remove_waits_for_in_flight_mutation() {
    let store = Arc::new(SessionStore::new(10, 10));
    let busy = store.create().unwrap();
    let other = store.create().unwrap();
    let (holder, release) = hold_session(&store, &busy);

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let remover = {
        let store = Arc::clone(&store);
        let busy = busy.clone();
        std::thread::spawn(move || {
            store.remove(&busy);
            done_tx.send(()).unwrap();
        })
    };
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

    // a different session is not held up
    let moved = store.mutate(&other, |s| Ok(s.id().clone())).unwrap();
    assert_eq!(moved, other);
    assert!(store.create().is_ok());

    release.send(()).unwrap();
    holder.join().unwrap();
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    remover.join().unwrap();

    assert!(matches!(store.get(&busy), Err(SessionError::NotFound(_))));
    assert!(store.get(&other).is_ok());
}

#[test]
fn test_sweep_waits_for_in_flight_mutation() {
    let store = Arc::new(SessionStore::new(10, 10));
    let busy = store.create().unwrap();
    let (holder, release) = hold_session(&store, &busy);

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let sweeper = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            let removed = store.sweep(Utc::now() + TimeDelta::hours(2), Duration::from_secs(3600));
            done_tx.send(removed).unwrap();
        })
    };
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

    // sessions outside the sweep stay usable while it waits
    let fresh = store.create().unwrap();
    assert!(store.mutate(&fresh, |_| Ok(())).is_ok());
    assert!(store.get(&fresh).is_ok());

    release.send(()).unwrap();
    holder.join().unwrap();
    let removed = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    sweeper.join().unwrap();

    assert!(removed.contains(&busy));
    assert!(matches!(store.get(&busy), Err(SessionError::NotFound(_))));
}
