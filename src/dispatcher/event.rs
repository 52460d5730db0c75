//! Event names, payloads, and processors.
//!
//! # Responsibilities
//! - Name a category of occurrence (`Event`)
//! - Carry an opaque payload through the dispatcher untouched
//! - Wrap async processor closures behind a cheap, clonable handle
//!
//! # Design Decisions
//! - Payloads are `Arc<dyn Any>`; the dispatcher never inspects them
//! - Processors are type-erased so modules can register without generics leaking

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::dispatcher::context::DispatchContext;

/// Boxed error returned by processors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single processor invocation.
pub type ProcessorResult = Result<(), BoxError>;

/// Opaque event payload shared by every processor of one dispatch.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Wrap a value as a dispatch payload.
pub fn payload<T: Any + Send + Sync>(value: T) -> Payload {
    Arc::new(value)
}

/// Name of a category of occurrence, e.g. `"user.created"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Event(Cow<'static, str>);

impl Event {
    /// Create an event name known at compile time.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Event {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type ProcessorFn = dyn Fn(DispatchContext, Payload) -> BoxFuture<'static, ProcessorResult> + Send + Sync;

/// A unit of work invoked for an event.
///
/// Cloning is cheap; two clones registered under the same event run twice.
#[derive(Clone)]
pub struct Processor {
    inner: Arc<ProcessorFn>,
}

impl Processor {
    /// Build a processor from an async closure.
    ///
    /// ```rust,ignore
    /// let p = Processor::new(|_ctx, payload| async move {
    ///     let user = payload.downcast_ref::<UserCreated>().ok_or("unexpected payload")?;
    ///     send_welcome_email(user).await
    /// });
    /// ```
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(DispatchContext, Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcessorResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |ctx: DispatchContext, payload: Payload| f(ctx, payload).boxed()),
        }
    }

    pub(crate) fn call(&self, ctx: DispatchContext, payload: Payload) -> BoxFuture<'static, ProcessorResult> {
        (self.inner)(ctx, payload)
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor").finish_non_exhaustive()
    }
}

/// A module that exposes a batch of processors keyed by event.
pub trait EventListener {
    fn event_processors(&self) -> Vec<(Event, Vec<Processor>)>;
}
