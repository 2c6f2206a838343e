//! Event sink that records every published event.

use std::sync::{Arc, Mutex, MutexGuard};

use flowframe::{Event, EventSink};
use rstest::fixture;

/// Thread-safe [`EventSink`] keeping events in publication order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    /// Create an empty sink ready to hand to an analyzer.
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    /// Type-erased handle for [`Analyzer::new`](flowframe::Analyzer::new).
    #[must_use]
    pub fn as_sink(self: &Arc<Self>) -> Arc<dyn EventSink> { self.clone() }

    fn guard(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().expect("collecting sink poisoned")
    }

    /// Remove and return the events recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<Event> { std::mem::take(&mut *self.guard()) }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize { self.guard().len() }

    /// Whether nothing was published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.guard().is_empty() }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: Event) { self.guard().push(event); }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn collecting_sink() -> Arc<CollectingSink> { CollectingSink::new() }
