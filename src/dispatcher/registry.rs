//! Event-to-processor registry.
//!
//! # Responsibilities
//! - Append processors per event in registration order
//! - Hand out consistent snapshots to in-flight dispatches
//!
//! # Design Decisions
//! - Each entry is an immutable `Arc<[Processor]>` replaced copy-on-write
//!   under the shard's write lock, so a snapshot is an `Arc` clone and can
//!   never observe a partially appended list
//! - Append-only: no de-duplication, no removal

use std::sync::Arc;

use dashmap::DashMap;

use crate::dispatcher::event::{Event, EventListener, Processor};

/// Registered event with its processor count (for diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EventSummary {
    pub event: String,
    pub processors: usize,
}

/// Per-event ordered processor lists, safe for concurrent register and dispatch.
#[derive(Debug, Default)]
pub struct EventRegistry {
    processors: DashMap<Event, Arc<[Processor]>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `processor` to the list for `event`.
    pub fn register(&self, event: impl Into<Event>, processor: Processor) {
        self.append(event.into(), std::slice::from_ref(&processor));
    }

    /// Append every processor of every entry; each entry is appended atomically.
    pub fn register_all<I>(&self, processors_by_event: I)
    where
        I: IntoIterator<Item = (Event, Vec<Processor>)>,
    {
        for (event, processors) in processors_by_event {
            self.append(event, &processors);
        }
    }

    pub fn add_listener(&self, listener: &dyn EventListener) {
        self.register_all(listener.event_processors());
    }

    /// Current processors for `event`, in registration order.
    pub fn snapshot(&self, event: &Event) -> Arc<[Processor]> {
        self.processors
            .get(event)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn processor_count(&self, event: &Event) -> usize {
        self.processors.get(event).map(|entry| entry.len()).unwrap_or(0)
    }

    /// All events with at least one processor, sorted by name.
    pub fn events(&self) -> Vec<EventSummary> {
        let mut events: Vec<EventSummary> = self
            .processors
            .iter()
            .map(|entry| EventSummary {
                event: entry.key().to_string(),
                processors: entry.value().len(),
            })
            .collect();
        events.sort_by(|a, b| a.event.cmp(&b.event));
        events
    }

    fn append(&self, event: Event, new: &[Processor]) {
        if new.is_empty() {
            return;
        }

        let mut entry = self
            .processors
            .entry(event)
            .or_insert_with(|| Arc::from(Vec::new()));

        let mut list = Vec::with_capacity(entry.len() + new.len());
        list.extend(entry.iter().cloned());
        list.extend(new.iter().cloned());
        *entry = Arc::from(list);

        tracing::debug!(event = %entry.key(), processors = entry.len(), "Processor registered");
    }
}
