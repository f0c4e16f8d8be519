//! Event handler registry.
//!
//! Maps event names to an ordered list of handlers. Dispatch runs over a
//! snapshot of the list, so handlers may register or remove handlers
//! (including themselves) while being invoked.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{error, trace};

use crate::identifiers::HandlerId;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Receives the event payload. Handlers for one event run in registration
/// order with the same payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

type HandlerMap = FxHashMap<String, Vec<(HandlerId, EventHandler)>>;

// ============================================================================
// EventHandlers
// ============================================================================

/// Owned mapping from event name to handlers.
///
/// Only reachable through `on`/`off`/`dispatch`; the map itself is never
/// exposed.
#[derive(Default)]
pub(crate) struct EventHandlers {
    map: Mutex<HandlerMap>,
}

impl EventHandlers {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`.
    pub(crate) fn on(&self, event: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId::next();
        self.map
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));

        trace!(event, %id, "Handler registered");
        id
    }

    /// Removes one handler, or every handler for `event` when `id` is `None`.
    ///
    /// Returns the number of handlers removed.
    pub(crate) fn off(&self, event: &str, id: Option<HandlerId>) -> usize {
        let mut map = self.map.lock();

        let Some(handlers) = map.get_mut(event) else {
            return 0;
        };

        let removed = match id {
            Some(id) => {
                let before = handlers.len();
                handlers.retain(|(existing, _)| *existing != id);
                before - handlers.len()
            }
            None => {
                let count = handlers.len();
                handlers.clear();
                count
            }
        };

        if handlers.is_empty() {
            map.remove(event);
        }

        removed
    }

    /// Number of handlers registered for `event`.
    pub(crate) fn count(&self, event: &str) -> usize {
        self.map.lock().get(event).map_or(0, Vec::len)
    }

    /// Invokes every handler for `event` with `data`.
    ///
    /// Returns the number of handlers invoked. A panicking handler is logged
    /// and does not stop the remaining handlers.
    pub(crate) fn dispatch(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.map.lock().get(event) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => return 0,
        };

        for handler in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(data))).is_err() {
                error!(event, "Event handler panicked");
            }
        }

        snapshot.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
