//! Retry executor with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 3 (4 total attempts)
//! - Base delay: 1000ms
//! - Multiplier: 2.0 (delays 1s, 2s, 4s, ...)
//! - Max delay: none unless set with [`RetryConfig::with_max_delay`]
//!
//! # Retryable Errors
//!
//! Every error is retried unless a condition is set with
//! [`RetryConfig::retry_if`]; [`Error::is_recoverable`] is a ready-made one.
//! A cancellation is never retried.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::metrics::MetricsCollector;

// ============================================================================
// Constants
// ============================================================================

/// Default retry budget, not counting the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default growth factor between retries.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

// ============================================================================
// RetryConfig
// ============================================================================

/// Predicate deciding whether an error is worth another attempt.
pub type RetryCondition = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Retry budget and backoff shape.
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Factor applied to the delay after every retry.
    pub backoff_multiplier: f64,

    /// Optional upper bound on one delay.
    pub max_delay: Option<Duration>,

    retry_condition: Option<RetryCondition>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("max_delay", &self.max_delay)
            .field("retry_condition", &self.retry_condition.is_some())
            .finish()
    }
}

impl RetryConfig {
    /// Creates a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay: None,
            retry_condition: None,
        }
    }

    /// Creates a config that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new().with_max_retries(0)
    }

    /// Sets the retry budget.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[inline]
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the delay ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Retries only errors for which `condition` returns `true`.
    #[must_use]
    pub fn retry_if<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Some(Arc::new(condition));
        self
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the multiplier is below 1 or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::config(format!(
                "backoff_multiplier must be a finite value >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt + 1`.
    ///
    /// `base_delay * multiplier^attempt`, capped at `max_delay` when set.
    /// Saturates at [`Duration::MAX`] when uncapped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Returns `true` if `error` may be retried.
    #[must_use]
    pub fn should_retry(&self, error: &Error) -> bool {
        if error.is_cancelled() {
            return false;
        }
        match &self.retry_condition {
            Some(condition) => condition(error),
            None => true,
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Runs `operation` until it succeeds or the retry budget is spent.
///
/// Each retry is counted in `metrics` before its delay starts. Returns the
/// last error once retries are exhausted; non-retryable errors return
/// immediately.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn execute_with_retry<T, F, Fut>(
    operation: F,
    config: &RetryConfig,
    metrics: &MetricsCollector,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    run(operation, config, metrics, None).await
}

/// Retry loop; backoff waits end early with `Cancelled` when `cancel` fires.
pub(crate) async fn run<T, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    metrics: &MetricsCollector,
    cancel: Option<(&RequestId, &CancellationToken)>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if attempt >= config.max_retries || !config.should_retry(&error) {
            return Err(error);
        }

        let delay = config.delay_for(attempt);
        metrics.record_retry();
        warn!(
            attempt = attempt + 1,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Retrying after failure"
        );

        match cancel {
            Some((id, token)) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(Error::cancelled(id.clone())),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }

        attempt += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================
