//! Typed publish/subscribe channel for DataCloud state transitions.

use tokio::sync::broadcast;
use tracing::trace;

/// State transitions a `DataCloud` announces to its listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudEvent {
    /// First successful fetch cycle completed; emitted exactly once.
    Loaded,
    /// The fetching flag flipped.
    FetchingChanged,
    /// The error string changed (set or cleared).
    ErrorChanged,
    /// A fetch cycle committed new data.
    DataUpdated,
}

/// Broadcast-backed event bus.
///
/// Slow subscribers may observe `Lagged` and miss intermediate events;
/// every event here is state-change shaped, so catching up from the
/// current DataCloud state is always sufficient.
pub struct EventBus {
    tx: broadcast::Sender<CloudEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CloudEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: CloudEvent) {
        if self.tx.send(event).is_err() {
            trace!(?event, "event dropped; no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
