//! Concurrency-limited batch execution.
//!
//! Runs independent requests through a sliding window of at most
//! `max_concurrent` in-flight futures. Higher-priority items start first;
//! results always come back in input order.
//!
//! # Example
//!
//! ```ignore
//! let requests = ids
//!     .into_iter()
//!     .map(|id| BatchRequest::new(format!("task-{id}"), id))
//!     .collect();
//!
//! let results = batch_requests(
//!     |_key, id| fetch_task(id),
//!     requests,
//!     &BatchOptions::new().with_max_concurrent(3),
//! )
//! .await;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Default number of requests in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

// ============================================================================
// Priority
// ============================================================================

/// Scheduling priority of a batch item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Started after everything else.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// Started before everything else.
    High,
}

// ============================================================================
// BatchRequest
// ============================================================================

/// One item of a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest<C> {
    /// Caller-chosen key, echoed in the result.
    pub key: String,
    /// Request descriptor handed to the executor.
    pub config: C,
    /// Scheduling priority.
    pub priority: Priority,
}

impl<C> BatchRequest<C> {
    /// Creates a normal-priority item.
    #[must_use]
    pub fn new(key: impl Into<String>, config: C) -> Self {
        Self {
            key: key.into(),
            config,
            priority: Priority::Normal,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// BatchOptions
// ============================================================================

/// Progress callback, invoked with `(completed, total)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Batch scheduling options.
#[derive(Clone)]
pub struct BatchOptions {
    /// Maximum items in flight. Zero is treated as one.
    pub max_concurrent: usize,

    /// Stop starting new items after the first failure.
    pub stop_on_error: bool,

    on_progress: Option<ProgressCallback>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOptions")
            .field("max_concurrent", &self.max_concurrent)
            .field("stop_on_error", &self.stop_on_error)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl BatchOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            stop_on_error: false,
            on_progress: None,
        }
    }

    /// Sets the concurrency limit.
    #[inline]
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Sets whether the first failure stops scheduling.
    #[inline]
    #[must_use]
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    /// Sets the progress callback.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of one batch item.
#[derive(Debug)]
pub enum BatchOutcome<T> {
    /// The executor returned a value.
    Success(T),
    /// The executor failed.
    Failure(Error),
    /// The item was cancelled; never counts as a failure.
    Cancelled,
    /// Never started because an earlier item failed with `stop_on_error`.
    Skipped,
}

/// Result of one batch item, in input position.
#[derive(Debug)]
pub struct BatchItemResult<T> {
    /// Key of the originating request.
    pub key: String,
    /// What happened.
    pub outcome: BatchOutcome<T>,
}

impl<T> BatchItemResult<T> {
    /// Returns `true` on success.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Success(_))
    }

    /// Returns `true` if the item was cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Cancelled)
    }

    /// Returns the error, if the item failed.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            BatchOutcome::Failure(e) => Some(e),
            _ => None,
        }
    }

    /// Converts into a `Result`; skipped items become [`Error::Request`].
    ///
    /// # Errors
    ///
    /// Returns the item's error, [`Error::Cancelled`] keyed by the item key
    /// if it was cancelled, or a request error if it was skipped.
    pub fn into_result(self) -> Result<T> {
        match self.outcome {
            BatchOutcome::Success(value) => Ok(value),
            BatchOutcome::Failure(e) => Err(e),
            BatchOutcome::Cancelled => Err(Error::cancelled(RequestId::new(&self.key))),
            BatchOutcome::Skipped => Err(Error::request(format!(
                "batch item {} skipped after earlier failure",
                self.key
            ))),
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Runs every request through `executor` under the options' limits.
///
/// Never fails as a whole: item errors, and items whose future panics, are
/// reported as [`BatchOutcome::Failure`]. An item failing with
/// [`Error::Cancelled`] is reported as [`BatchOutcome::Cancelled`] and does
/// not trigger `stop_on_error`.
pub async fn batch_requests<C, T, F, Fut>(
    mut executor: F,
    requests: Vec<BatchRequest<C>>,
    options: &BatchOptions,
) -> Vec<BatchItemResult<T>>
where
    F: FnMut(String, C) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = requests.len();
    let limit = options.max_concurrent.max(1);

    let keys: Vec<String> = requests.iter().map(|r| r.key.clone()).collect();
    let mut outcomes: Vec<Option<BatchOutcome<T>>> = (0..total).map(|_| None).collect();

    // Stable sort keeps input order within a priority.
    let mut queue: Vec<(usize, BatchRequest<C>)> = requests.into_iter().enumerate().collect();
    queue.sort_by_key(|(_, request)| Reverse(request.priority));
    let mut queue = queue.into_iter();

    debug!(total, max_concurrent = limit, "Batch started");

    let mut in_flight = FuturesUnordered::new();
    let mut completed = 0;
    let mut stopped = false;

    loop {
        while !stopped && in_flight.len() < limit {
            let Some((index, request)) = queue.next() else {
                break;
            };
            trace!(key = %request.key, priority = ?request.priority, "Batch item started");
            let future = executor(request.key, request.config);
            in_flight.push(async move { (index, AssertUnwindSafe(future).catch_unwind().await) });
        }

        let Some((index, result)) = in_flight.next().await else {
            break;
        };

        let outcome = match result {
            Ok(Ok(value)) => BatchOutcome::Success(value),
            Ok(Err(e)) if e.is_cancelled() => {
                debug!(key = %keys[index], "Batch item cancelled");
                BatchOutcome::Cancelled
            }
            Ok(Err(e)) => BatchOutcome::Failure(e),
            Err(_) => {
                error!(key = %keys[index], "Batch item panicked");
                BatchOutcome::Failure(Error::request("batch item panicked"))
            }
        };

        if let BatchOutcome::Failure(e) = &outcome {
            debug!(key = %keys[index], error = %e, "Batch item failed");
            if options.stop_on_error && !stopped {
                debug!("Stopping batch after failure");
                stopped = true;
            }
        }

        outcomes[index] = Some(outcome);
        completed += 1;

        if let Some(callback) = &options.on_progress {
            callback(completed, total);
        }
    }

    let skipped = total - completed;
    debug!(total, completed, skipped, "Batch finished");

    keys.into_iter()
        .zip(outcomes)
        .map(|(key, outcome)| BatchItemResult {
            key,
            outcome: outcome.unwrap_or(BatchOutcome::Skipped),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
