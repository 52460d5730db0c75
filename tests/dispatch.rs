//! Fan-out, isolation and drain behaviour of the dispatcher.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use appkit::dispatcher::{
    payload, AsyncTracker, DispatchContext, DispatchError, Dispatcher, Processor, Transaction,
};
use futures_util::future::BoxFuture;

mod common;

#[tokio::test]
async fn test_no_processors_is_success() {
    let dispatcher = Dispatcher::new();
    let result = dispatcher
        .dispatch(&DispatchContext::background(), "nothing.here", payload(1u8))
        .await;
    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatch_waits_for_every_processor() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    for delay_ms in [1, 5, 20, 40, 80] {
        dispatcher.add_processor(
            "user.created",
            common::counting_processor(&counter, Duration::from_millis(delay_ms)),
        );
    }

    dispatcher
        .dispatch(&DispatchContext::background(), "user.created", payload("alice"))
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_failure_still_runs_siblings() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        dispatcher.add_processor(
            "order.paid",
            common::counting_processor(&counter, Duration::from_millis(30)),
        );
    }
    dispatcher.add_processor(
        "order.paid",
        common::failing_processor("inventory unavailable", Duration::from_millis(1)),
    );

    let err = dispatcher
        .dispatch(&DispatchContext::background(), "order.paid", payload(()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("inventory unavailable"));
    assert_eq!(counter.load(Ordering::SeqCst), 3, "siblings must finish before dispatch returns");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_processor_is_isolated() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    dispatcher.add_processor(
        "report.generated",
        common::counting_processor(&counter, Duration::from_millis(20)),
    );
    dispatcher.add_processor(
        "report.generated",
        Processor::new(|_, _| async move { panic!("template missing") }),
    );

    let err = dispatcher
        .dispatch(&DispatchContext::background(), "report.generated", payload(()))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Panicked { .. }));
    assert_eq!(err.event().map(|e| e.as_str()), Some("report.generated"));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration_is_not_lost() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let registrations: Vec<_> = (0..64)
        .map(|_| {
            let dispatcher = dispatcher.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                dispatcher.add_processor(
                    "metrics.flush",
                    common::counting_processor(&counter, Duration::ZERO),
                );
            })
        })
        .collect();
    for registration in registrations {
        registration.await.unwrap();
    }

    dispatcher
        .dispatch(&DispatchContext::background(), "metrics.flush", payload(()))
        .await
        .unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 64);
}

#[tokio::test]
async fn test_cancellation_reaches_processors_but_not_siblings() {
    let dispatcher = Dispatcher::new();
    let early_exits = Arc::new(AtomicUsize::new(0));

    let exits = early_exits.clone();
    dispatcher.add_processor(
        "sync.remote",
        Processor::new(move |ctx, _| {
            let exits = exits.clone();
            async move {
                tokio::select! {
                    _ = ctx.cancelled() => { exits.fetch_add(1, Ordering::SeqCst); }
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                }
                Ok(())
            }
        }),
    );
    // Cancelling its own context must not reach the sibling above.
    dispatcher.add_processor(
        "sync.remote",
        Processor::new(|ctx, _| async move {
            ctx.cancel();
            Ok(())
        }),
    );

    let ctx = DispatchContext::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    dispatcher.dispatch(&ctx, "sync.remote", payload(())).await.unwrap();

    assert_eq!(early_exits.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[derive(Default)]
struct RecordingTransaction {
    committed: AtomicBool,
    rolled_back: AtomicBool,
}

impl Transaction for RecordingTransaction {
    fn within(
        self: Arc<Self>,
        work: BoxFuture<'static, Result<(), DispatchError>>,
    ) -> BoxFuture<'static, Result<(), DispatchError>> {
        Box::pin(async move {
            let result = work.await;
            match &result {
                Ok(()) => self.committed.store(true, Ordering::SeqCst),
                Err(_) => self.rolled_back.store(true, Ordering::SeqCst),
            }
            result
        })
    }
}

#[tokio::test]
async fn test_transaction_commits_on_success() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    dispatcher.add_processor("account.opened", common::counting_processor(&counter, Duration::ZERO));

    let tx = Arc::new(RecordingTransaction::default());
    let ctx = DispatchContext::background().with_transaction(tx.clone());
    dispatcher.dispatch(&ctx, "account.opened", payload(())).await.unwrap();

    assert!(tx.committed.load(Ordering::SeqCst));
    assert!(!tx.rolled_back.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_transaction_rolls_back_on_failure() {
    let dispatcher = Dispatcher::new();
    dispatcher.add_processor(
        "account.opened",
        common::failing_processor("kyc rejected", Duration::ZERO),
    );

    let tx = Arc::new(RecordingTransaction::default());
    let ctx = DispatchContext::background().with_transaction(tx.clone());
    assert!(dispatcher.dispatch(&ctx, "account.opened", payload(())).await.is_err());

    assert!(tx.rolled_back.load(Ordering::SeqCst));
    assert!(!tx.committed.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_drain_waits_for_work_started_during_drain() {
    let tracker = AsyncTracker::new();
    let late_done = Arc::new(AtomicBool::new(false));

    let inner_tracker = tracker.clone();
    let flag = late_done.clone();
    tracker.spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Started while drain() below is already waiting.
        inner_tracker.spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            flag.store(true, Ordering::SeqCst);
        });
    });

    tracker.drain().await;
    assert!(late_done.load(Ordering::SeqCst));
    assert_eq!(tracker.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_async_dispatch_is_drained_by_stop() {
    let dispatcher = Dispatcher::new();
    let counter = Arc::new(AtomicUsize::new(0));
    dispatcher.add_processor(
        "email.queued",
        common::counting_processor(&counter, Duration::from_millis(50)),
    );

    for _ in 0..5 {
        dispatcher.dispatch_async("email.queued", payload(()));
    }
    assert!(dispatcher.tracker().outstanding() > 0);

    dispatcher.stop().await;
    assert_eq!(counter.load(Ordering::SeqCst), 5);
}
