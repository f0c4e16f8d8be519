//! Resilient Client - Network resilience for dashboard-style clients.
//!
//! This library keeps a long-lived event socket alive and runs request/response
//! work through cancellation, retry and batching with adaptive timeouts.
//!
//! # Architecture
//!
//! The client is built from small, explicitly shared parts:
//!
//! - **Connection**: one logical socket, reconnecting after drops, routing
//!   `{event, data}` frames to named handlers
//! - **Request manager**: registers each request for cancellation, retries
//!   failures with exponential backoff, bounds every attempt by a timeout
//!   derived from current network quality
//! - **Metrics**: success/failure/retry counters feeding health indicators
//!
//! Key design principles:
//!
//! - No global state: metrics, registry and observer are constructed and passed
//! - Cancellation is a distinct outcome, never counted as a failure
//! - Batch results keep input order regardless of completion order
//! - Reconnect timers are owned by the connection and stop on close
//!
//! # Quick Start
//!
//! ```no_run
//! use resilient_client::{Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .page_origin("https://admin.example.com")
//!         .reconnect_attempts(5)
//!         .build()?;
//!
//!     // Live updates
//!     client.connection().on("task.updated", |data| {
//!         println!("task changed: {data}");
//!     });
//!     client.connect("/api/ws")?;
//!
//!     // Managed request: cancellable, retried, timed out adaptively
//!     let count = client
//!         .requests()
//!         .execute("task-count", || async { Ok(42) })
//!         .await?;
//!     println!("tasks: {count}, health: {:?}", client.health());
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client facade and builder |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`metrics`] | Request outcome counters and health |
//! | [`network`] | Network quality and adaptive timeouts |
//! | [`protocol`] | Socket envelope format |
//! | [`request`] | Cancellation, retry and batching |
//! | [`transport`] | Reconnecting socket layer |

// ============================================================================
// Modules
// ============================================================================

/// Client facade and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for requests and handlers.
pub mod identifiers;

/// Request outcome counters.
pub mod metrics;

/// Network condition tracking.
pub mod network;

/// Socket envelope format.
pub mod protocol;

/// Request lifecycle: cancellation, retry and batching.
pub mod request;

/// Reconnecting socket transport.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{HandlerId, RequestId};

// Metrics types
pub use metrics::{HealthStatus, MetricsCollector, MetricsSnapshot};

// Network types
pub use network::{ConnectionInfo, ConnectionQuality, EffectiveType, NetworkObserver, NetworkStatus};

// Protocol types
pub use protocol::Envelope;

// Request types
pub use request::{
    BatchItemResult, BatchOptions, BatchOutcome, BatchRequest, CancellationRegistry, Priority,
    RequestManager, RetryConfig, batch_requests, execute_with_retry,
};

// Transport types
pub use transport::{
    Connection, ConnectionOptions, ConnectionState, Connector, EventHandler, PageContext,
    WebSocketConnector,
};
