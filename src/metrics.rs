//! Request outcome counters.
//!
//! [`MetricsCollector`] aggregates success, failure, retry and latency
//! figures across independent call sites. It is constructed explicitly and
//! shared through `Arc`; there is no global instance.
//!
//! # Example
//!
//! ```ignore
//! let metrics = Arc::new(MetricsCollector::new());
//! metrics.record_success(Duration::from_millis(120));
//! metrics.record_failure();
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.total_requests, 2);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

// ============================================================================
// Constants
// ============================================================================

/// Minimum success rate reported as healthy.
const HEALTHY_RATE: f64 = 0.95;

/// Minimum success rate reported as degraded.
const DEGRADED_RATE: f64 = 0.80;

// ============================================================================
// MetricsSnapshot
// ============================================================================

/// Immutable view of the counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Requests that completed, successfully or not.
    pub total_requests: u64,
    /// Requests that succeeded.
    pub successful_requests: u64,
    /// Requests that failed after exhausting retries.
    pub failed_requests: u64,
    /// Retries scheduled across all requests.
    pub retry_count: u64,
    /// Running average latency of successful requests.
    pub average_response_time: Duration,
}

impl MetricsSnapshot {
    /// Fraction of completed requests that succeeded, if any completed.
    #[must_use]
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            return None;
        }
        Some(self.successful_requests as f64 / self.total_requests as f64)
    }

    /// Classifies the success rate for health indicators.
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        match self.success_rate() {
            None => HealthStatus::Unknown,
            Some(rate) if rate >= HEALTHY_RATE => HealthStatus::Healthy,
            Some(rate) if rate >= DEGRADED_RATE => HealthStatus::Degraded,
            Some(_) => HealthStatus::Unhealthy,
        }
    }
}

// ============================================================================
// HealthStatus
// ============================================================================

/// Coarse health derived from the success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// At least 95% of requests succeed.
    Healthy,
    /// At least 80% of requests succeed.
    Degraded,
    /// Fewer than 80% of requests succeed.
    Unhealthy,
    /// No requests have completed yet.
    Unknown,
}

// ============================================================================
// MetricsCollector
// ============================================================================

/// Thread-safe request outcome aggregator.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsCollector {
    /// Creates a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful request and folds `duration` into the average.
    ///
    /// The average is kept in nanoseconds with saturating arithmetic, so
    /// extreme latencies or counts skew it instead of panicking.
    pub fn record_success(&self, duration: Duration) {
        let mut metrics = self.inner.lock();
        let n = u128::from(metrics.successful_requests);

        let total = metrics
            .average_response_time
            .as_nanos()
            .saturating_mul(n)
            .saturating_add(duration.as_nanos());
        metrics.average_response_time = duration_from_nanos(total / (n + 1));
        metrics.total_requests = metrics.total_requests.saturating_add(1);
        metrics.successful_requests = metrics.successful_requests.saturating_add(1);

        trace!(latency_ms = duration.as_millis() as u64, "Request succeeded");
    }

    /// Records a request that failed for good.
    pub fn record_failure(&self) {
        let mut metrics = self.inner.lock();
        metrics.total_requests = metrics.total_requests.saturating_add(1);
        metrics.failed_requests = metrics.failed_requests.saturating_add(1);
    }

    /// Records one scheduled retry.
    pub fn record_retry(&self) {
        let mut metrics = self.inner.lock();
        metrics.retry_count = metrics.retry_count.saturating_add(1);
    }

    /// Returns a copy of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.lock()
    }

    /// Shorthand for `snapshot().health()`.
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.snapshot().health()
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        *self.inner.lock() = MetricsSnapshot::default();
        debug!("Metrics reset");
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    // Remainder is below one second, so it always fits.
    let subsec = (nanos % NANOS_PER_SEC) as u32;
    u64::try_from(nanos / NANOS_PER_SEC).map_or(Duration::MAX, |secs| Duration::new(secs, subsec))
}

// ============================================================================
// Tests
// ============================================================================
