//! Request lifecycle: cancellation, retry and batching.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  RequestManager::execute(id, operation)                  │
//! │                                                          │
//! │  CancellationRegistry ──► token                          │
//! │  NetworkObserver ───────► adaptive timeout (at dispatch) │
//! │  retry::run ────────────► attempts + backoff             │
//! │  MetricsCollector ◄────── success / failure / retry      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `batch` | Concurrency-limited batch executor |
//! | `cancel` | Cancellation registry |
//! | `manager` | End-to-end request coordination |
//! | `retry` | Retry policy and executor |

// ============================================================================
// Submodules
// ============================================================================

/// Concurrency-limited batch executor.
pub mod batch;

/// Cancellation registry.
pub mod cancel;

/// End-to-end request coordination.
pub mod manager;

/// Retry policy and executor.
pub mod retry;

// ============================================================================
// Re-exports
// ============================================================================

pub use batch::{
    BatchItemResult, BatchOptions, BatchOutcome, BatchRequest, Priority, ProgressCallback,
    batch_requests,
};
pub use cancel::{CancellationRegistry, Registration};
pub use manager::RequestManager;
pub use retry::{RetryCondition, RetryConfig, execute_with_retry};
