//! Engine serializer tests: lazy launch, single restart, availability.

mod common;

use common::{Reply, ScriptedLauncher};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use strictly_chess::{EngineErrorKind, EngineSerializer, GamePosition};

fn serializer(launcher: &ScriptedLauncher) -> EngineSerializer {
    EngineSerializer::new(Arc::new(launcher.clone()), Duration::from_millis(10))
}

#[tokio::test]
async fn test_launches_lazily_on_first_request() {
    let launcher = ScriptedLauncher::new([Reply::Move("e2e4")]);
    let engine = serializer(&launcher);
    assert!(!engine.is_available());
    assert_eq!(launcher.probe.launches(), 0);

    let best = engine.request_move(&GamePosition::new()).await.unwrap();
    assert_eq!(best.as_deref(), Some("e2e4"));
    assert_eq!(launcher.probe.launches(), 1);
    assert!(engine.is_available());
    assert_eq!(engine.searches_completed(), 1);
}

#[tokio::test]
async fn test_no_move_is_reported_as_none() {
    let launcher = ScriptedLauncher::new([Reply::NoMove]);
    let engine = serializer(&launcher);
    engine.start().await.unwrap();

    assert_eq!(engine.request_move(&GamePosition::new()).await.unwrap(), None);
}

#[tokio::test]
async fn test_failed_search_restarts_handle_once() {
    let launcher = ScriptedLauncher::new([Reply::Fail, Reply::Move("g1f3")]);
    let engine = serializer(&launcher);
    engine.start().await.unwrap();

    let err = engine.request_move(&GamePosition::new()).await.unwrap_err();
    assert_eq!(err.kind, EngineErrorKind::Failure);
    assert_eq!(launcher.probe.launches(), 2);
    assert_eq!(launcher.probe.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(engine.search_failures(), 1);
    assert!(engine.is_available());

    // the restarted handle serves the next request; nothing was retried
    let best = engine.request_move(&GamePosition::new()).await.unwrap();
    assert_eq!(best.as_deref(), Some("g1f3"));
    assert_eq!(launcher.probe.searches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_restart_is_unavailable() {
    let launcher = ScriptedLauncher::new([Reply::Fail]);
    let engine = serializer(&launcher);
    engine.start().await.unwrap();
    launcher.probe.refuse_launch.store(true, Ordering::SeqCst);

    let err = engine.request_move(&GamePosition::new()).await.unwrap_err();
    assert_eq!(err.kind, EngineErrorKind::Unavailable);
    assert!(!engine.is_available());
}

#[tokio::test]
async fn test_launch_failure_is_unavailable() {
    let launcher = ScriptedLauncher::refusing();
    let engine = serializer(&launcher);

    assert_eq!(engine.start().await.unwrap_err().kind, EngineErrorKind::Unavailable);
    let err = engine.request_move(&GamePosition::new()).await.unwrap_err();
    assert_eq!(err.kind, EngineErrorKind::Unavailable);
    assert!(!engine.is_available());

    // recovers once the engine can start again
    launcher.probe.refuse_launch.store(false, Ordering::SeqCst);
    assert!(engine.request_move(&GamePosition::new()).await.unwrap().is_some());
    assert!(engine.is_available());
}

#[tokio::test]
async fn test_restart_replaces_handle() {
    let launcher = ScriptedLauncher::new([]);
    let engine = serializer(&launcher);
    engine.start().await.unwrap();

    engine.restart().await.unwrap();
    assert_eq!(launcher.probe.launches(), 2);
    assert_eq!(launcher.probe.shutdowns.load(Ordering::SeqCst), 1);

    engine.shutdown().await;
    assert_eq!(launcher.probe.shutdowns.load(Ordering::SeqCst), 2);
    assert!(!engine.is_available());
}

#[tokio::test]
async fn test_concurrent_requests_are_serialized() {
    let launcher = ScriptedLauncher::new([]).with_search_time(Duration::from_millis(10));
    let engine = Arc::new(serializer(&launcher));

    let tasks: Vec<_> = (0..5)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.request_move(&GamePosition::new()).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_some());
    }

    assert_eq!(launcher.probe.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.probe.launches(), 1);
    assert_eq!(engine.searches_completed(), 5);
}

#[tokio::test]
async fn test_errors_keep_their_origin() {
    let launcher = ScriptedLauncher::new([Reply::Fail]);
    let engine = serializer(&launcher);
    engine.start().await.unwrap();

    // the search error is passed through, not rebuilt
    let err = engine.request_move(&GamePosition::new()).await.unwrap_err();
    assert_eq!(err.kind, EngineErrorKind::Failure);
    assert_eq!(err.message, "scripted crash");
    assert!(err.file.ends_with("mod.rs"), "{}", err.file);

    let refusing = ScriptedLauncher::refusing();
    let err = serializer(&refusing).start().await.unwrap_err();
    assert_eq!(err.message, "scripted launch refusal");
    assert!(err.file.ends_with("mod.rs"), "{}", err.file);
}
