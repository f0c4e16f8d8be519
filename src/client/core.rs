//! Client coordinator.
//!
//! The [`Client`] owns one reconnecting [`Connection`] and one
//! [`RequestManager`], wired to a shared metrics collector, cancellation
//! registry and network observer.
//!
//! # Example
//!
//! ```ignore
//! let client = Client::builder()
//!     .page_origin("https://admin.example.com")
//!     .build()?;
//!
//! client.connection().on("task.updated", |data| refresh(data));
//! client.connect("/api/ws")?;
//!
//! let task = client
//!     .requests()
//!     .execute("task-42", || api.fetch_task(42))
//!     .await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use crate::error::Result;
use crate::metrics::{HealthStatus, MetricsCollector};
use crate::network::NetworkObserver;
use crate::request::{BatchOptions, CancellationRegistry, RequestManager, RetryConfig};
use crate::transport::{Connection, ConnectionOptions, Connector};

use super::builder::ClientBuilder;

// ============================================================================
// Client
// ============================================================================

/// Resilient client coordinator.
///
/// Cloning is cheap; clones share the connection and all request state.
#[derive(Clone)]
pub struct Client {
    connection: Connection,
    requests: RequestManager,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.connection.state())
            .field("url", &self.connection.url())
            .field("active_requests", &self.cancellations().active_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wires a client from validated parts.
    pub(crate) fn new(
        connector: Arc<dyn Connector>,
        connection: ConnectionOptions,
        retry: RetryConfig,
        batch: BatchOptions,
    ) -> Self {
        let requests = RequestManager::new(
            Arc::new(MetricsCollector::new()),
            Arc::new(CancellationRegistry::new()),
            Arc::new(NetworkObserver::new()),
        )
        .with_retry(retry)
        .with_batch_options(batch);

        debug!(
            reconnect_attempts = connection.reconnect_attempts,
            max_concurrent = requests.batch_options().max_concurrent,
            "Client created"
        );

        Self {
            connection: Connection::new(connector, connection),
            requests,
        }
    }

    /// Opens the socket at `url`. See [`Connection::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the URL
    /// cannot be resolved.
    pub fn connect(&self, url: &str) -> Result<Url> {
        self.connection.connect(url)
    }

    /// Cancels every in-flight request and closes the socket.
    pub async fn shutdown(&self) {
        let cancelled = self.cancellations().cancel_all();
        self.connection.shutdown().await;
        info!(cancelled, "Client shut down");
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// The reconnecting socket.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The request lifecycle manager.
    #[inline]
    #[must_use]
    pub fn requests(&self) -> &RequestManager {
        &self.requests
    }

    /// Shared metrics collector.
    #[inline]
    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        self.requests.metrics()
    }

    /// Shared cancellation registry.
    #[inline]
    #[must_use]
    pub fn cancellations(&self) -> &Arc<CancellationRegistry> {
        self.requests.cancellations()
    }

    /// Shared network observer.
    #[inline]
    #[must_use]
    pub fn network(&self) -> &Arc<NetworkObserver> {
        self.requests.network()
    }

    /// Health derived from the request success rate.
    #[inline]
    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.metrics().health()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::error::Error;
    use crate::network::{ConnectionInfo, ConnectionQuality, EffectiveType};
    use crate::testing::{MockConnector, init_tracing, wait_until};
    use crate::transport::ConnectionState;

    fn client(connector: &MockConnector) -> anyhow::Result<Client> {
        init_tracing();
        let client = Client::builder()
            .connector(Arc::new(connector.clone()))
            .page_origin("http://localhost:8080")
            .reconnect_interval(Duration::from_millis(100))
            .build()?;
        Ok(client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_resolves_against_page_origin() -> anyhow::Result<()> {
        let connector = MockConnector::new();
        let client = client(&connector)?;

        let url = client.connect("/api/ws")?;
        assert_eq!(url.as_str(), "ws://localhost:8080/api/ws");

        wait_until(|| client.connection().is_open()).await;
        assert_eq!(connector.urls(), vec![url]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_follows_request_outcomes() -> anyhow::Result<()> {
        let connector = MockConnector::new();
        let client = client(&connector)?;
        assert_eq!(client.health(), HealthStatus::Unknown);

        client.requests().execute("ok", || async { Ok(()) }).await?;
        assert_eq!(client.health(), HealthStatus::Healthy);

        let failed: Result<()> = client
            .requests()
            .execute("bad", || async { Err(Error::status(400, "rejected")) })
            .await;
        assert!(failed.is_err());
        assert_eq!(client.health(), HealthStatus::Unhealthy);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_feeds_request_timeouts() -> anyhow::Result<()> {
        let connector = MockConnector::new();
        let client = client(&connector)?;

        client
            .network()
            .update_connection(ConnectionInfo::new(EffectiveType::FourG).with_rtt(30));
        assert_eq!(client.network().quality(), ConnectionQuality::Good);

        let result: Result<()> = client
            .requests()
            .execute("hang", std::future::pending)
            .await;

        assert!(matches!(
            result,
            Err(Error::RequestTimeout { timeout_ms: 10_000, .. })
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_requests_and_closes() -> anyhow::Result<()> {
        let connector = MockConnector::new();
        let client = client(&connector)?;
        client.connect("/api/ws")?;
        wait_until(|| client.connection().is_open()).await;

        let runner = client.clone();
        let pending = tokio::spawn(async move {
            runner
                .requests()
                .execute("task-7", || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .await
        });
        wait_until(|| client.cancellations().active_count() == 1).await;

        client.shutdown().await;

        assert!(pending.await?.expect_err("cancelled").is_cancelled());
        assert_eq!(client.connection().state(), ConnectionState::Closed);
        assert!(connector.peer(0).is_disconnected());
        Ok(())
    }
}
