//! Client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Owns the connection and request manager |
//! | [`ClientBuilder`] | Fluent configuration builder |
//!
//! # Example
//!
//! ```ignore
//! use resilient_client::{Client, Result};
//!
//! let client = Client::builder()
//!     .page_origin("https://admin.example.com")
//!     .build()?;
//!
//! client.connection().on("connect", |_| println!("live updates on"));
//! client.connect("/api/ws")?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
