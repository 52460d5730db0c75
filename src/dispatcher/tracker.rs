//! Outstanding async work tracking for orderly shutdown.
//!
//! # Responsibilities
//! - Count background dispatches that started but have not finished
//! - Let shutdown wait until that count reaches zero
//!
//! # Design Decisions
//! - The count lives in a `watch` channel: every change is atomic with
//!   respect to readers and `drain` wakes on each change instead of polling
//! - A guard releases the slot on drop, so panicking or aborted tasks
//!   still count as finished
//! - `drain` is a barrier over all work outstanding while it waits, not a
//!   snapshot taken when it was called

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Tracks outstanding asynchronous work.
#[derive(Debug, Clone)]
pub struct AsyncTracker {
    outstanding: Arc<watch::Sender<usize>>,
}

impl AsyncTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            outstanding: Arc::new(tx),
        }
    }

    /// Record one unit of outstanding work. Released when the guard drops.
    pub fn track(&self) -> TrackGuard {
        self.outstanding.send_modify(|n| *n += 1);
        metrics::set_async_outstanding(self.outstanding());
        TrackGuard {
            outstanding: Arc::clone(&self.outstanding),
        }
    }

    /// Run `future` on its own task, counted until it completes.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    /// Number of tracked units not yet finished.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Wait until no tracked work is outstanding.
    pub async fn drain(&self) {
        let mut rx = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for AsyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot held by one unit of tracked work.
#[derive(Debug)]
pub struct TrackGuard {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Drop for TrackGuard {
    fn drop(&mut self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
        metrics::set_async_outstanding(*self.outstanding.borrow());
    }
}
