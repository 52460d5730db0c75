//! Process-wide default dispatcher.
//!
//! Lets independently initialised modules register processors before the
//! owning code builds its `App`. The instance is created once, on first
//! use, with a background context; it is torn down once by `App::run`
//! draining its tracker during shutdown. Code that can take a
//! [`Dispatcher`] explicitly should do so; [`global`] hands out a clone.

use std::sync::OnceLock;

use crate::dispatcher::context::DispatchContext;
use crate::dispatcher::dispatch::Dispatcher;
use crate::dispatcher::error::DispatchError;
use crate::dispatcher::event::{Event, EventListener, Payload, Processor};

static GLOBAL: OnceLock<Dispatcher> = OnceLock::new();

/// Handle to the process-wide dispatcher.
pub fn global() -> Dispatcher {
    GLOBAL.get_or_init(Dispatcher::new).clone()
}

pub fn set_background_context(ctx: DispatchContext) {
    global().set_background_context(ctx);
}

pub fn add_listener(listener: &dyn EventListener) {
    global().add_listener(listener);
}

pub fn add_processor(event: impl Into<Event>, processor: Processor) {
    global().add_processor(event, processor);
}

pub async fn dispatch(
    ctx: &DispatchContext,
    event: impl Into<Event>,
    payload: Payload,
) -> Result<(), DispatchError> {
    global().dispatch(ctx, event, payload).await
}
