//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use resilient_client::{Client, RetryConfig};
//!
//! let client = Client::builder()
//!     .page_origin("https://admin.example.com")
//!     .reconnect_attempts(10)
//!     .retry(RetryConfig::new().with_max_retries(5))
//!     .max_concurrent(4)
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::request::{BatchOptions, RetryConfig};
use crate::transport::{ConnectionOptions, Connector, PageContext, WebSocketConnector};

use super::core::Client;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct ClientBuilder {
    /// Transport factory; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    /// Origin of the embedding page, for relative socket URLs.
    page_origin: Option<String>,
    /// Reconnect policy.
    connection: ConnectionOptions,
    /// Retry policy for managed requests.
    retry: RetryConfig,
    /// Batch concurrency limit.
    max_concurrent: Option<usize>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("custom_connector", &self.connector.is_some())
            .field("page_origin", &self.page_origin)
            .field("connection", &self.connection)
            .field("retry", &self.retry)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport factory.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the page origin used to resolve scheme-less socket URLs.
    ///
    /// # Arguments
    ///
    /// * `origin` - `http://` or `https://` origin (e.g., "https://admin.example.com")
    #[inline]
    #[must_use]
    pub fn page_origin(mut self, origin: impl Into<String>) -> Self {
        self.page_origin = Some(origin.into());
        self
    }

    /// Sets the reconnect attempt budget.
    #[inline]
    #[must_use]
    pub fn reconnect_attempts(mut self, attempts: u32) -> Self {
        self.connection = self.connection.with_reconnect_attempts(attempts);
        self
    }

    /// Sets the fixed delay between reconnect attempts.
    #[inline]
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.connection = self.connection.with_reconnect_interval(interval);
        self
    }

    /// Sets the bound on one connect attempt.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connection = self.connection.with_connect_timeout(timeout);
        self
    }

    /// Sets the retry policy for managed requests.
    #[inline]
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the batch concurrency limit.
    #[inline]
    #[must_use]
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the page origin is not an http(s) URL
    /// - [`Error::Config`] if a timeout, multiplier or limit is out of range
    pub fn build(self) -> Result<Client> {
        let connection = self.validate_connection()?;
        let batch = self.validate_batch()?;
        self.retry.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        Ok(Client::new(connector, connection, self.retry, batch))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the connection configuration and attaches the page context.
    fn validate_connection(&self) -> Result<ConnectionOptions> {
        let mut options = self.connection.clone();

        if let Some(origin) = &self.page_origin {
            options = options.with_page(PageContext::new(origin)?);
        }

        options.validate()?;
        Ok(options)
    }

    /// Validates the batch configuration.
    fn validate_batch(&self) -> Result<BatchOptions> {
        let options = BatchOptions::new();
        match self.max_concurrent {
            None => Ok(options),
            Some(0) => Err(Error::config(
                "max_concurrent must be at least 1.\n\
                 Example: Client::builder().max_concurrent(6)",
            )),
            Some(limit) => Ok(options.with_max_concurrent(limit)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default_builder() {
        let builder = ClientBuilder::new();
        assert!(builder.connector.is_none());
        assert!(builder.page_origin.is_none());
        assert_eq!(builder.connection, ConnectionOptions::default());
        assert!(builder.max_concurrent.is_none());
    }

    #[test]
    fn test_setters_update_connection_options() {
        let builder = ClientBuilder::new()
            .reconnect_attempts(2)
            .reconnect_interval(Duration::from_millis(500))
            .connect_timeout(Duration::from_secs(3));

        assert_eq!(builder.connection.reconnect_attempts, 2);
        assert_eq!(builder.connection.reconnect_interval, Duration::from_millis(500));
        assert_eq!(builder.connection.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_build_fails_with_invalid_origin() {
        let result = ClientBuilder::new().page_origin("ftp://files.example.com").build();
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn test_build_fails_with_zero_concurrency() {
        let result = ClientBuilder::new().max_concurrent(0).build();

        let err = result.expect_err("should reject zero");
        assert!(err.to_string().contains("max_concurrent"));
    }

    #[test]
    fn test_build_fails_with_bad_retry() {
        let result = ClientBuilder::new()
            .retry(RetryConfig::new().with_backoff_multiplier(0.0))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_fails_with_zero_connect_timeout() {
        let result = ClientBuilder::new().connect_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = ClientBuilder::new().page_origin("https://admin.example.com");
        let cloned = builder.clone();
        assert_eq!(builder.page_origin, cloned.page_origin);
    }
}
