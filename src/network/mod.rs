//! Network condition tracking.
//!
//! Classifies the link from platform signals and derives the adaptive
//! per-request timeout used by the request manager.
//!
//! | Quality | Condition | Timeout |
//! |---------|-----------|---------|
//! | `Offline` | platform reports offline | 30s |
//! | `Slow` | slow-2g/2g, rtt ≥ 1000ms, downlink < 0.5Mbps, save-data | 30s |
//! | `Good` | 4g with rtt < 100ms | 10s |
//! | `Normal` | anything else, including no signals | 15s |

// ============================================================================
// Submodules
// ============================================================================

/// Signal observer and subscription channel.
pub mod observer;

/// Snapshot types and classification.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use observer::NetworkObserver;
pub use status::{ConnectionInfo, ConnectionQuality, EffectiveType, NetworkStatus};
