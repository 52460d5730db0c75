//! Dispatch error types.

use crate::dispatcher::event::{BoxError, Event};

/// Failure of a single dispatch call.
///
/// When several processors fail, the one observed first wins. Completion
/// order is not deterministic, so neither is the reported processor.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A processor returned an error.
    #[error("processor for event '{event}' failed: {source}")]
    Processor {
        event: Event,
        #[source]
        source: BoxError,
    },

    /// A processor panicked; the panic was contained.
    #[error("processor for event '{event}' panicked: {message}")]
    Panicked { event: Event, message: String },

    /// A processor task was aborted by the runtime before completing.
    #[error("processor for event '{event}' was cancelled")]
    Cancelled { event: Event },

    /// The surrounding transaction failed to commit or roll back.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl DispatchError {
    pub fn event(&self) -> Option<&Event> {
        match self {
            DispatchError::Processor { event, .. }
            | DispatchError::Panicked { event, .. }
            | DispatchError::Cancelled { event } => Some(event),
            DispatchError::Transaction(_) => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, DispatchError::Panicked { .. })
    }
}
