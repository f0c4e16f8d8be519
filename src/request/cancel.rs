//! Cancellation registry.
//!
//! Maps logical request ids to live [`CancellationToken`]s so callers can
//! cancel one request, every request sharing a prefix, or everything.
//!
//! Registering an id that is already live cancels the previous token before
//! replacing it. Each registration carries a ticket so that a superseded
//! request finishing late never removes the newer entry.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

struct Entry {
    ticket: u64,
    token: CancellationToken,
}

/// A live registration returned by [`CancellationRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    ticket: u64,
    token: CancellationToken,
}

impl Registration {
    /// Token signalled when the request is cancelled.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

// ============================================================================
// CancellationRegistry
// ============================================================================

/// Registry of in-flight cancellable requests.
#[derive(Default)]
pub struct CancellationRegistry {
    entries: Mutex<FxHashMap<RequestId, Entry>>,
    next_ticket: AtomicU64,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns its token.
    ///
    /// A live entry for the same id is cancelled first.
    pub fn create(&self, id: &RequestId) -> CancellationToken {
        self.register(id).token
    }

    /// Registers `id`, returning the ticketed registration.
    pub fn register(&self, id: &RequestId) -> Registration {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = self.entries.lock().insert(
            id.clone(),
            Entry {
                ticket,
                token: token.clone(),
            },
        );

        if let Some(previous) = previous {
            debug!(%id, "Request re-issued, cancelling previous");
            previous.token.cancel();
        }

        Registration { ticket, token }
    }

    /// Cancels and removes `id`. Returns `true` if it was live.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let Some(entry) = self.entries.lock().remove(id) else {
            return false;
        };
        entry.token.cancel();
        debug!(%id, "Request cancelled");
        true
    }

    /// Cancels every live id starting with `prefix`. Returns the count.
    pub fn cancel_by_prefix(&self, prefix: &str) -> usize {
        let cancelled: Vec<Entry> = {
            let mut entries = self.entries.lock();
            let ids: Vec<RequestId> = entries
                .keys()
                .filter(|id| id.has_prefix(prefix))
                .cloned()
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        for entry in &cancelled {
            entry.token.cancel();
        }

        debug!(prefix, count = cancelled.len(), "Requests cancelled by prefix");
        cancelled.len()
    }

    /// Cancels every live id. Returns the count.
    pub fn cancel_all(&self) -> usize {
        let cancelled: Vec<Entry> = self.entries.lock().drain().map(|(_, e)| e).collect();

        for entry in &cancelled {
            entry.token.cancel();
        }

        debug!(count = cancelled.len(), "All requests cancelled");
        cancelled.len()
    }

    /// Removes `id` without cancelling it.
    pub fn complete(&self, id: &RequestId) {
        self.entries.lock().remove(id);
    }

    /// Removes `registration` if it is still the live entry for `id`.
    ///
    /// Returns `false` if the registration was cancelled or superseded.
    pub fn finish(&self, id: &RequestId, registration: &Registration) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if entry.ticket == registration.ticket => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if `id` is live.
    #[must_use]
    pub fn contains(&self, id: &RequestId) -> bool {
        self.entries.lock().contains_key(id)
    }
}

impl std::fmt::Debug for CancellationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationRegistry")
            .field("active", &self.active_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
