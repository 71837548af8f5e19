//! Integration tests for the tokio-backed engine.

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use cofacade_engine::CoroutineId;
use cofacade_engine::Engine;
use cofacade_engine::EngineError;
use cofacade_engine::TokioEngine;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

fn engine() -> TokioEngine {
    TokioEngine::new(Handle::current())
}

async fn wait_until_idle(engine: &TokioEngine) {
    for _ in 0..200 {
        if engine.live_count() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("coroutines still live: {}", engine.live_count());
}

fn explode_cleanup() {
    panic!("cleanup exploded");
}

fn explode_body() {
    panic!("body exploded");
}

#[test]
fn test_create_on_dropped_runtime_is_refused() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let engine = TokioEngine::new(runtime.handle().clone());
    drop(runtime);

    let ran = Arc::new(Mutex::new(false));
    let body_ran = Arc::clone(&ran);
    let result = engine.create(Box::pin(async move {
        *body_ran.lock().unwrap() = true;
    }));

    assert_eq!(result, Err(EngineError::ShutDown));
    assert_eq!(engine.live_count(), 0);
    assert!(!*ran.lock().unwrap());
}

#[test]
fn test_try_current_outside_runtime() {
    assert!(TokioEngine::try_current().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_current_id_outside_coroutine() {
    let engine = engine();
    assert_eq!(engine.current_id(), CoroutineId::NONE);

    // A plain tokio task is not a coroutine.
    let observer = engine.clone();
    let id = tokio::spawn(async move { observer.current_id() }).await.unwrap();
    assert_eq!(id, CoroutineId::NONE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_assigns_increasing_ids() {
    let engine = engine();
    let (tx, rx) = oneshot::channel();
    let observer = engine.clone();
    let first = engine
        .create(Box::pin(async move {
            let _ = tx.send(observer.current_id());
        }))
        .unwrap();
    let second = engine.create(Box::pin(async {})).unwrap();

    assert!(first.is_coroutine());
    assert!(second > first);
    assert_eq!(rx.await.unwrap(), first);
    wait_until_idle(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parent_ids() {
    let engine = engine();
    let (tx, rx) = oneshot::channel();
    let outer_engine = engine.clone();
    let outer = engine
        .create(Box::pin(async move {
            let own_parent = outer_engine.parent_id(None).unwrap();
            let (inner_tx, inner_rx) = oneshot::channel();
            let inner_engine = outer_engine.clone();
            let inner = outer_engine
                .create(Box::pin(async move {
                    let _ = inner_tx.send(inner_engine.parent_id(None).unwrap());
                }))
                .unwrap();
            let inner_parent = inner_rx.await.unwrap();
            let _ = tx.send((own_parent, inner, inner_parent, outer_engine.current_id()));
        }))
        .unwrap();

    let (own_parent, inner, inner_parent, outer_seen) = rx.await.unwrap();
    assert_eq!(own_parent, CoroutineId::ROOT);
    assert_eq!(outer_seen, outer);
    assert_eq!(inner_parent, outer);
    assert!(inner > outer);
    wait_until_idle(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parent_id_of_live_handle_from_outside() {
    let engine = engine();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let id = engine
        .create(Box::pin(async move {
            let _ = release_rx.await;
        }))
        .unwrap();

    assert_eq!(engine.parent_id(Some(id)), Ok(CoroutineId::ROOT));
    let _ = release_tx.send(());
    wait_until_idle(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parent_id_failures_are_distinct() {
    let engine = engine();
    assert_eq!(engine.parent_id(None), Err(EngineError::NotInCoroutine));
    assert_eq!(
        engine.parent_id(Some(CoroutineId::ROOT)),
        Err(EngineError::NotInCoroutine)
    );

    let id = engine.create(Box::pin(async {})).unwrap();
    wait_until_idle(&engine).await;
    assert_eq!(engine.parent_id(Some(id)), Err(EngineError::Destroyed(id)));
    assert_matches!(
        engine.parent_id(Some(CoroutineId::NONE)),
        Err(EngineError::Destroyed(_))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deferred_actions_run_newest_first() {
    let engine = engine();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = oneshot::channel();

    let body_engine = engine.clone();
    let body_order = Arc::clone(&order);
    engine
        .create(Box::pin(async move {
            for n in 1..=3 {
                let order = Arc::clone(&body_order);
                body_engine
                    .defer(Box::new(move || order.lock().unwrap().push(n)))
                    .unwrap();
            }
            let order = Arc::clone(&body_order);
            body_engine
                .defer(Box::new(move || {
                    order.lock().unwrap().push(0);
                    let _ = tx.send(());
                }))
                .unwrap();
        }))
        .unwrap();

    rx.await.unwrap();
    wait_until_idle(&engine).await;
    assert_eq!(*order.lock().unwrap(), vec![0, 3, 2, 1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deferred_actions_survive_panics() {
    let engine = engine();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let body_engine = engine.clone();
    let body_ran = Arc::clone(&ran);
    engine
        .create(Box::pin(async move {
            let first = Arc::clone(&body_ran);
            body_engine
                .defer(Box::new(move || first.lock().unwrap().push("first")))
                .unwrap();
            body_engine
                .defer(Box::new(explode_cleanup))
                .unwrap();
            let observer = body_engine.clone();
            let last = Arc::clone(&body_ran);
            body_engine
                .defer(Box::new(move || {
                    // Deferred actions still see their coroutine.
                    let label = if observer.current_id().is_coroutine() {
                        "last-in-context"
                    } else {
                        "last-outside"
                    };
                    last.lock().unwrap().push(label);
                }))
                .unwrap();
            explode_body();
        }))
        .unwrap();

    wait_until_idle(&engine).await;
    assert_eq!(*ran.lock().unwrap(), vec!["last-in-context", "first"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_defer_outside_coroutine_is_rejected() {
    let engine = engine();
    let result = engine.defer(Box::new(|| {}));
    assert_eq!(result, Err(EngineError::NotInCoroutine));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_engines_do_not_share_frames() {
    let first = engine();
    let second = engine();
    let (tx, rx) = oneshot::channel();
    let observer = second.clone();
    first
        .create(Box::pin(async move {
            let _ = tx.send(observer.current_id());
        }))
        .unwrap();
    assert_eq!(rx.await.unwrap(), CoroutineId::NONE);
    wait_until_idle(&first).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_limit_and_shutdown() {
    let engine = TokioEngine::with_limit(Handle::current(), Some(1));
    assert_eq!(engine.max_coroutines(), Some(1));

    let (release_tx, release_rx) = oneshot::channel::<()>();
    engine
        .create(Box::pin(async move {
            let _ = release_rx.await;
        }))
        .unwrap();
    assert_eq!(
        engine.create(Box::pin(async {})),
        Err(EngineError::LimitReached { limit: 1 })
    );

    let _ = release_tx.send(());
    wait_until_idle(&engine).await;
    assert!(engine.create(Box::pin(async {})).is_ok());

    engine.shutdown();
    assert!(engine.is_shut_down());
    assert_eq!(engine.create(Box::pin(async {})), Err(EngineError::ShutDown));
    wait_until_idle(&engine).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sleep_waits() {
    let engine = engine();
    let start = std::time::Instant::now();
    engine.sleep(Duration::from_millis(20)).await;
    assert!(start.elapsed() >= Duration::from_millis(20));
}
