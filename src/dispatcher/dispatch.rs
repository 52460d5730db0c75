//! Event fan-out.
//!
//! # Responsibilities
//! - Resolve the processors registered for an event
//! - Run them concurrently, optionally inside the context's transaction
//! - Contain processor panics and report them
//! - Track fire-and-forget dispatches so shutdown can wait for them
//!
//! # Design Decisions
//! - One task per processor; a dispatch returns only after every task ends
//! - The first failure observed (completion order) is returned
//! - A panic fails only its own processor; siblings run to completion

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::dispatcher::context::DispatchContext;
use crate::dispatcher::error::DispatchError;
use crate::dispatcher::event::{Event, EventListener, Payload, Processor};
use crate::dispatcher::registry::EventRegistry;
use crate::dispatcher::report::{panic_message, LogPanicReporter, PanicReport, PanicReporter};
use crate::dispatcher::tracker::AsyncTracker;
use crate::observability::metrics;

struct Inner {
    registry: EventRegistry,
    tracker: AsyncTracker,
    background: ArcSwap<DispatchContext>,
    reporter: Arc<dyn PanicReporter>,
}

/// Publish/subscribe dispatcher.
///
/// Cheap to clone; clones share registry, tracker and background context.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Create a dispatcher that reports panics through the log.
    pub fn new() -> Self {
        Self::with_panic_reporter(Arc::new(LogPanicReporter))
    }

    pub fn with_panic_reporter(reporter: Arc<dyn PanicReporter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: EventRegistry::new(),
                tracker: AsyncTracker::new(),
                background: ArcSwap::from_pointee(DispatchContext::background()),
                reporter,
            }),
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.inner.registry
    }

    /// Tracker counting in-flight [`Dispatcher::dispatch_async`] calls.
    pub fn tracker(&self) -> &AsyncTracker {
        &self.inner.tracker
    }

    pub fn add_processor(&self, event: impl Into<Event>, processor: Processor) {
        self.inner.registry.register(event, processor);
    }

    pub fn add_listener(&self, listener: &dyn EventListener) {
        self.inner.registry.add_listener(listener);
    }

    /// Replace the context used when the caller supplies none.
    pub fn set_background_context(&self, ctx: DispatchContext) {
        self.inner.background.store(Arc::new(ctx));
    }

    pub fn background_context(&self) -> DispatchContext {
        self.inner.background.load().as_ref().clone()
    }

    /// Run every processor registered for `event` and wait for all of them.
    ///
    /// Returns `Ok(())` when nothing is registered. When several processors
    /// fail, which error is returned depends on completion order.
    pub async fn dispatch(
        &self,
        ctx: &DispatchContext,
        event: impl Into<Event>,
        payload: Payload,
    ) -> Result<(), DispatchError> {
        let event = event.into();
        let processors = self.inner.registry.snapshot(&event);
        if processors.is_empty() {
            tracing::trace!(event = %event, "No processors registered");
            return Ok(());
        }

        let span = tracing::debug_span!(
            "dispatch",
            event = %event,
            processors = processors.len(),
            request_id = ctx.request_id().unwrap_or("none"),
            extra = %ctx.log_extra_fields(),
        );
        let started = Instant::now();

        let fan_out = fan_out(
            event.clone(),
            processors,
            ctx.clone(),
            payload,
            Arc::clone(&self.inner.reporter),
        )
        .instrument(span.clone());

        let result = match ctx.transaction() {
            Some(transaction) => {
                Arc::clone(transaction)
                    .within(fan_out.boxed())
                    .instrument(span)
                    .await
            }
            None => fan_out.await,
        };

        metrics::record_dispatch(event.as_str(), started, result.is_ok());
        result
    }

    /// [`Dispatcher::dispatch`] with the background context.
    pub async fn dispatch_background(
        &self,
        event: impl Into<Event>,
        payload: Payload,
    ) -> Result<(), DispatchError> {
        let ctx = self.background_context();
        self.dispatch(&ctx, event, payload).await
    }

    /// Dispatch on a tracked background task with the background context.
    ///
    /// Failures are logged; the handle also yields them. [`Dispatcher::stop`]
    /// waits for every call still in flight.
    pub fn dispatch_async(
        &self,
        event: impl Into<Event>,
        payload: Payload,
    ) -> JoinHandle<Result<(), DispatchError>> {
        let dispatcher = self.clone();
        let event = event.into();
        self.inner.tracker.spawn(async move {
            let ctx = dispatcher.background_context();
            let result = dispatcher.dispatch(&ctx, event.clone(), payload).await;
            if let Err(error) = &result {
                tracing::error!(event = %event, error = %error, "Async dispatch failed");
            }
            result
        })
    }

    /// Wait until every async dispatch has finished.
    pub async fn stop(&self) {
        let outstanding = self.inner.tracker.outstanding();
        if outstanding > 0 {
            tracing::info!(outstanding, "Waiting for async dispatches");
        }
        self.inner.tracker.drain().await;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("events", &self.inner.registry.events().len())
            .field("outstanding", &self.inner.tracker.outstanding())
            .finish()
    }
}

async fn fan_out(
    event: Event,
    processors: Arc<[Processor]>,
    ctx: DispatchContext,
    payload: Payload,
    reporter: Arc<dyn PanicReporter>,
) -> Result<(), DispatchError> {
    let mut tasks: FuturesUnordered<_> = processors
        .iter()
        .cloned()
        .map(|processor| {
            let ctx = ctx.child();
            let payload = Arc::clone(&payload);
            tokio::spawn(async move { processor.call(ctx, payload).await }.in_current_span())
        })
        .collect();

    let mut first_error = None;
    while let Some(joined) = tasks.next().await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(source)) => {
                tracing::warn!(event = %event, error = %source, "Processor failed");
                metrics::record_processor_failure(event.as_str());
                DispatchError::Processor {
                    event: event.clone(),
                    source,
                }
            }
            Err(join_error) if join_error.is_panic() => {
                let message = panic_message(join_error.into_panic().as_ref());
                reporter.report(&PanicReport {
                    event: event.clone(),
                    request_id: ctx.request_id().map(str::to_string),
                    message: message.clone(),
                });
                DispatchError::Panicked {
                    event: event.clone(),
                    message,
                }
            }
            Err(_) => DispatchError::Cancelled {
                event: event.clone(),
            },
        };
        first_error.get_or_insert(failure);
    }

    first_error.map_or(Ok(()), Err)
}
