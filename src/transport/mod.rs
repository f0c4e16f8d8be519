//! Persistent socket transport layer.
//!
//! Turns one reconnecting socket into a named-event bus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                          ┌──────────────────┐
//! │  Connection      │     FrameSink/Stream     │  Connector       │
//! │  (handle)        │◄────────────────────────►│  (WebSocket)     │
//! │  on/off/emit     │                          │                  │
//! │  SessionTask ────┼── reconnect after close ─┤                  │
//! └──────────────────┘                          └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Create handle with connector and options
//! 2. `Connection::on` - Register handlers (any time)
//! 3. `Connection::connect` - Resolve URL, spawn session task
//! 4. Session task opens transport, fires `connect`, pumps frames
//! 5. On close: fires `disconnect`, reconnects within budget
//! 6. `Connection::close` - Tear down, no further attempts
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle and session event loop |
//! | `connector` | Transport seam and WebSocket implementation |
//! | `events` | Event handler registry |
//! | `options` | Reconnect policy |
//! | `endpoint` | Socket URL normalization |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and session event loop.
pub mod connection;

/// Transport seam and WebSocket connector.
pub mod connector;

/// Event handler registry.
pub(crate) mod events;

/// Connection configuration.
pub mod options;

/// Socket URL normalization.
pub mod endpoint;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState};
pub use connector::{Connector, FrameSink, FrameStream, WebSocketConnector};
pub use events::EventHandler;
pub use options::ConnectionOptions;
pub use endpoint::{PageContext, resolve_socket_url};
