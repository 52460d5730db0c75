//! Concurrent shutdown: deadlines, force stop and failure aggregation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use appkit::config::ShutdownConfig;
use appkit::dispatcher::{payload, BoxError, Dispatcher};
use appkit::lifecycle::{
    ActionState, CoordinatorState, ShutdownAction, ShutdownCause, ShutdownCoordinator,
    ShutdownError,
};

mod common;

fn no_grace(timeout_ms: u64) -> ShutdownConfig {
    ShutdownConfig {
        grace_delay_ms: 0,
        graceful_timeout_ms: timeout_ms,
    }
}

#[tokio::test]
async fn test_mixed_outcomes_are_all_reported() {
    let coordinator = ShutdownCoordinator::new(no_grace(1_000));

    let a_stopped = Arc::new(AtomicBool::new(false));
    let flag = a_stopped.clone();
    coordinator
        .register(
            "cache",
            ShutdownAction::new(move || async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    let b_forced = Arc::new(AtomicBool::new(false));
    let forced = b_forced.clone();
    coordinator
        .register(
            "queue",
            ShutdownAction::new(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .deadline(Duration::from_millis(10))
            .on_force(move || forced.store(true, Ordering::SeqCst)),
        )
        .unwrap();

    coordinator
        .register(
            "db",
            ShutdownAction::new(|| async {
                tokio::time::sleep(Duration::from_millis(2)).await;
                Err(BoxError::from("connection reset during close"))
            }),
        )
        .unwrap();

    let started = Instant::now();
    let report = coordinator.shutdown(ShutdownCause::Requested).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.failures.len(), 2);
    assert!(!report.is_clean());
    assert!(report
        .failures
        .iter()
        .any(|f| matches!(f, ShutdownError::Timeout { name, .. } if name == "queue")));
    assert!(report
        .failures
        .iter()
        .any(|f| matches!(f, ShutdownError::Action { name, .. } if name == "db")));

    assert!(a_stopped.load(Ordering::SeqCst));
    assert!(b_forced.load(Ordering::SeqCst));
    assert_eq!(report.outcome("cache").unwrap().state, ActionState::Stopped);
    assert_eq!(report.outcome("queue").unwrap().state, ActionState::ForceStopped);
    assert_eq!(report.outcome("db").unwrap().state, ActionState::Failed);
}

#[tokio::test]
async fn test_actions_stop_concurrently() {
    let coordinator = ShutdownCoordinator::new(no_grace(5_000));
    for name in ["a", "b", "c", "d"] {
        coordinator
            .register(
                name,
                ShutdownAction::new(|| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                }),
            )
            .unwrap();
    }

    let started = Instant::now();
    let report = coordinator.shutdown(ShutdownCause::Requested).await;

    assert!(report.is_clean());
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_duplicate_name_is_rejected_and_first_kept() {
    let coordinator = ShutdownCoordinator::new(no_grace(1_000));
    let first_ran = Arc::new(AtomicBool::new(false));
    let second_ran = Arc::new(AtomicBool::new(false));

    let flag = first_ran.clone();
    coordinator
        .register(
            "search-index",
            ShutdownAction::new(move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

    let flag = second_ran.clone();
    let conflict = coordinator
        .register(
            "search-index",
            ShutdownAction::new(move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap_err();
    assert_eq!(conflict.name, "search-index");
    assert_eq!(coordinator.registered(), vec!["search-index".to_string()]);

    let report = coordinator.shutdown(ShutdownCause::Requested).await;
    assert_eq!(report.outcomes.len(), 1);
    assert!(first_ran.load(Ordering::SeqCst));
    assert!(!second_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_grace_delay_precedes_stop() {
    let coordinator = ShutdownCoordinator::new(ShutdownConfig {
        grace_delay_ms: 60,
        graceful_timeout_ms: 1_000,
    });
    let stopped_at = Arc::new(std::sync::Mutex::new(None));
    let slot = stopped_at.clone();
    coordinator
        .register(
            "http",
            ShutdownAction::new(move || async move {
                *slot.lock().unwrap() = Some(Instant::now());
                Ok(())
            }),
        )
        .unwrap();

    let started = Instant::now();
    let report = coordinator.shutdown(ShutdownCause::Signal).await;

    assert!(report.is_clean());
    assert_eq!(report.cause, ShutdownCause::Signal);
    let stopped_at = stopped_at.lock().unwrap().take().expect("action ran");
    assert!(stopped_at.duration_since(started) >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_endpoint_failure_triggers_shutdown() {
    let coordinator = ShutdownCoordinator::new(no_grace(1_000));
    coordinator
        .register("worker", ShutdownAction::new(|| async { Ok(()) }))
        .unwrap();

    let trigger = coordinator.trigger();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.fail("http.public", "accept loop died");
    });

    let mut state = coordinator.state();
    let report = coordinator.run().await;

    assert_eq!(report.cause, ShutdownCause::EndpointFailure("http.public".into()));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name(), "http.public");
    assert_eq!(report.outcome("worker").unwrap().state, ActionState::Stopped);
    assert_eq!(*state.borrow_and_update(), CoordinatorState::Terminated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_dispatches_drain_before_report() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    dispatcher.add_processor(
        "invoice.sent",
        common::counting_processor(&counter, Duration::from_millis(80)),
    );

    let coordinator = ShutdownCoordinator::new(no_grace(1_000));
    coordinator.track_async(dispatcher.tracker().clone());
    for _ in 0..3 {
        dispatcher.dispatch_async("invoice.sent", payload(()));
    }

    let report = coordinator.shutdown(ShutdownCause::Requested).await;

    assert!(report.is_clean());
    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(dispatcher.tracker().outstanding(), 0);
}
