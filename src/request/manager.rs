//! Request lifecycle manager.
//!
//! [`RequestManager`] runs one logical request end to end:
//!
//! 1. Registers the id in the cancellation registry
//! 2. Captures the adaptive timeout from the network observer
//! 3. Runs attempts under the retry policy, each bounded by that timeout
//!    and raced against cancellation
//! 4. Records the outcome in the metrics collector
//! 5. Releases the registry entry
//!
//! A cancelled request surfaces as [`Error::Cancelled`] and is recorded as
//! neither success nor failure.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::metrics::MetricsCollector;
use crate::network::NetworkObserver;

use super::batch::{BatchItemResult, BatchOptions, BatchRequest, batch_requests};
use super::cancel::CancellationRegistry;
use super::retry::{self, RetryConfig};

// ============================================================================
// RequestManager
// ============================================================================

/// Coordinates cancellation, retry, adaptive timeouts and metrics.
///
/// Cloning is cheap; clones share the same registry, metrics and observer.
#[derive(Debug, Clone)]
pub struct RequestManager {
    metrics: Arc<MetricsCollector>,
    cancellations: Arc<CancellationRegistry>,
    network: Arc<NetworkObserver>,
    retry: RetryConfig,
    batch: BatchOptions,
}

impl RequestManager {
    /// Creates a manager over shared collaborators.
    #[must_use]
    pub fn new(
        metrics: Arc<MetricsCollector>,
        cancellations: Arc<CancellationRegistry>,
        network: Arc<NetworkObserver>,
    ) -> Self {
        Self {
            metrics,
            cancellations,
            network,
            retry: RetryConfig::new(),
            batch: BatchOptions::new(),
        }
    }

    /// Sets the retry policy applied by [`execute`](Self::execute).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the options applied by [`batch`](Self::batch).
    #[must_use]
    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.batch = options;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl RequestManager {
    /// Shared metrics collector.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Shared cancellation registry.
    #[inline]
    #[must_use]
    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        &self.cancellations
    }

    /// Shared network observer.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &Arc<NetworkObserver> {
        &self.network
    }

    /// Retry policy.
    #[inline]
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Default batch options.
    #[inline]
    #[must_use]
    pub fn batch_options(&self) -> &BatchOptions {
        &self.batch
    }
}

// ============================================================================
// Execution
// ============================================================================

impl RequestManager {
    /// Runs `operation` as request `id`.
    ///
    /// `operation` is called once per attempt. Re-issuing an id that is
    /// still in flight cancels the earlier request.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if the id was cancelled before completion
    /// - [`Error::RequestTimeout`] if the last attempt timed out
    /// - The operation's own error once retries are exhausted
    pub async fn execute<T, F, Fut>(&self, id: impl Into<RequestId>, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = id.into();
        let registration = self.cancellations.register(&id);
        let token = registration.token().clone();
        let timeout = self.network.recommended_timeout();
        let started = Instant::now();

        debug!(%id, timeout_ms = timeout.as_millis() as u64, "Request dispatched");

        let result = retry::run(
            || {
                let attempt = operation();
                let id = id.clone();
                let token = token.clone();
                async move { attempt_once(attempt, id, &token, timeout).await }
            },
            &self.retry,
            &self.metrics,
            Some((&id, &token)),
        )
        .await;

        // Whoever removes the entry first decides between completion and cancellation.
        let result = if self.cancellations.finish(&id, &registration) {
            result
        } else {
            Err(Error::cancelled(id.clone()))
        };

        match &result {
            Ok(_) => self.metrics.record_success(started.elapsed()),
            Err(e) if e.is_cancelled() => debug!(%id, "Request cancelled"),
            Err(e) => {
                warn!(%id, error = %e, "Request failed");
                self.metrics.record_failure();
            }
        }

        result
    }

    /// Runs `requests` through [`execute`](Self::execute) with the default
    /// batch options. Each item key doubles as its request id.
    pub async fn batch<C, T, F, Fut>(
        &self,
        requests: Vec<BatchRequest<C>>,
        executor: F,
    ) -> Vec<BatchItemResult<T>>
    where
        C: Clone,
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.batch_with_options(requests, &self.batch, executor).await
    }

    /// Like [`batch`](Self::batch) with explicit options.
    pub async fn batch_with_options<C, T, F, Fut>(
        &self,
        requests: Vec<BatchRequest<C>>,
        options: &BatchOptions,
        executor: F,
    ) -> Vec<BatchItemResult<T>>
    where
        C: Clone,
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let executor = &executor;
        batch_requests(
            move |key, config: C| self.execute(key, move || executor(config.clone())),
            requests,
            options,
        )
        .await
    }
}

/// One attempt, bounded by `timeout` and abandoned on cancellation.
async fn attempt_once<T>(
    attempt: impl Future<Output = Result<T>>,
    id: RequestId,
    token: &CancellationToken,
    timeout: Duration,
) -> Result<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::cancelled(id)),
        outcome = tokio::time::timeout(timeout, attempt) => match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::request_timeout(id, timeout.as_millis() as u64)),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::network::{ConnectionInfo, EffectiveType};
    use crate::request::batch::BatchOutcome;
    use crate::testing::{init_tracing, wait_until};

    fn manager() -> RequestManager {
        init_tracing();
        RequestManager::new(
            Arc::new(MetricsCollector::new()),
            Arc::new(CancellationRegistry::new()),
            Arc::new(NetworkObserver::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_records_latency_and_releases_id() {
        let manager = manager();

        let value = manager
            .execute("report", || async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok(7)
            })
            .await
            .expect("success");

        assert_eq!(value, 7);
        let snapshot = manager.metrics().snapshot();
        assert_eq!(snapshot.successful_requests, 1);
        assert_eq!(snapshot.average_response_time, Duration::from_millis(250));
        assert_eq!(manager.cancellations().active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_retries_is_recorded_once() {
        let manager = manager().with_retry(RetryConfig::new().with_max_retries(2));

        let result: Result<()> = manager
            .execute("flaky", || async { Err(Error::status(503, "unavailable")) })
            .await;

        assert!(matches!(result, Err(Error::Status { status: 503, .. })));
        let snapshot = manager.metrics().snapshot();
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.retry_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_captured_at_dispatch_and_retried() {
        let manager = manager().with_retry(RetryConfig::new().with_max_retries(1));
        manager
            .network()
            .update_connection(ConnectionInfo::new(EffectiveType::FourG).with_rtt(20));

        let calls = AtomicUsize::new(0);
        let network = Arc::clone(manager.network());
        let started = Instant::now();

        let result: Result<()> = manager
            .execute("slow", || {
                // Degrading mid-flight must not stretch this request's timeout.
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    network.set_online(false);
                }
                std::future::pending()
            })
            .await;

        let error = result.expect_err("timed out");
        assert!(matches!(error, Error::RequestTimeout { timeout_ms: 10_000, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Two 10s attempts plus one 1s backoff.
        assert_eq!(started.elapsed(), Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_in_flight_is_neither_success_nor_failure() {
        let manager = manager();
        let runner = manager.clone();

        let task = tokio::spawn(async move {
            runner
                .execute("task-1", || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
                .await
        });

        let id = RequestId::new("task-1");
        wait_until(|| manager.cancellations().contains(&id)).await;
        assert!(manager.cancellations().cancel(&id));

        let result = task.await.expect("join");
        assert!(result.expect_err("cancelled").is_cancelled());

        let snapshot = manager.metrics().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.failed_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reissued_id_cancels_previous() {
        let manager = manager();
        let first = manager.clone();

        let earlier = tokio::spawn(async move {
            first
                .execute("search", || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("stale")
                })
                .await
        });

        let id = RequestId::new("search");
        wait_until(|| manager.cancellations().contains(&id)).await;

        let latest = manager
            .execute("search", || async { Ok("fresh") })
            .await
            .expect("latest");

        assert_eq!(latest, "fresh");
        assert!(earlier.await.expect("join").expect_err("superseded").is_cancelled());
        assert_eq!(manager.metrics().snapshot().successful_requests, 1);
    }

    #[tokio::test]
    async fn test_pending_until_operation_resolves() {
        let manager = manager();
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let rx = parking_lot::Mutex::new(Some(rx));

        let mut call = tokio_test::task::spawn(manager.execute("wait", || {
            let rx = rx.lock().take();
            async move {
                match rx {
                    Some(rx) => rx.await.map_err(|_| Error::request("sender dropped")),
                    None => Err(Error::request("called twice")),
                }
            }
        }));

        tokio_test::assert_pending!(call.poll());
        assert!(manager.cancellations().contains(&RequestId::new("wait")));

        tx.send(9).expect("send");
        assert!(call.is_woken());
        let value = tokio_test::assert_ready!(call.poll()).expect("value");
        assert_eq!(value, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_uses_keys_as_request_ids() {
        let manager = manager().with_retry(RetryConfig::no_retry());
        let canceller = manager.clone();

        let requests: Vec<BatchRequest<u64>> = (0..4)
            .map(|i| BatchRequest::new(format!("task-{i}"), i))
            .chain(std::iter::once(BatchRequest::new("report", 99)))
            .collect();

        let cancel = tokio::spawn(async move {
            wait_until(|| canceller.cancellations().active_count() == 5).await;
            canceller.cancellations().cancel_by_prefix("task-")
        });

        let results = manager
            .batch(requests, |i: u64| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(i)
            })
            .await;

        assert_eq!(cancel.await.expect("join"), 4);
        for result in &results[..4] {
            assert!(matches!(result.outcome, BatchOutcome::Cancelled), "{}", result.key);
        }
        assert_eq!(results[4].key, "report");
        assert!(results[4].is_success());
        assert_eq!(manager.metrics().snapshot().successful_requests, 1);
    }
}
