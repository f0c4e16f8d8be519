//! Socket wire protocol.
//!
//! Every frame in either direction is a JSON text frame:
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | `event` | string | Event name; inbound frames may use `type` instead |
//! | `data` | any | Payload, `null` when absent |
//!
//! Three event names are reserved for synthetic lifecycle notifications:
//! [`CONNECT_EVENT`], [`DISCONNECT_EVENT`] and [`ERROR_EVENT`].

// ============================================================================
// Submodules
// ============================================================================

/// Event envelope and reserved event names.
pub mod envelope;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{CONNECT_EVENT, DISCONNECT_EVENT, ERROR_EVENT, Envelope, is_reserved};
