//! Network signal observer.
//!
//! The embedding platform feeds online/offline and connection signals into a
//! [`NetworkObserver`]; every signal republishes a full [`NetworkStatus`]
//! snapshot over a `watch` channel.
//!
//! # Example
//!
//! ```ignore
//! let observer = NetworkObserver::new();
//! let mut updates = observer.subscribe();
//!
//! observer.update_connection(ConnectionInfo::new(EffectiveType::TwoG));
//! updates.changed().await?;
//! assert!(updates.borrow().is_slow());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use super::status::{ConnectionInfo, ConnectionQuality, NetworkStatus};

// ============================================================================
// NetworkObserver
// ============================================================================

/// Holds the current network snapshot and publishes changes.
#[derive(Debug)]
pub struct NetworkObserver {
    status_tx: watch::Sender<NetworkStatus>,
}

impl Default for NetworkObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkObserver {
    /// Creates an observer assuming an online link of normal quality.
    #[must_use]
    pub fn new() -> Self {
        Self::with_status(NetworkStatus::default())
    }

    /// Creates an observer with an initial snapshot.
    #[must_use]
    pub fn with_status(status: NetworkStatus) -> Self {
        let (status_tx, _) = watch::channel(status);
        Self { status_tx }
    }

    /// Records an online/offline signal.
    pub fn set_online(&self, online: bool) {
        self.publish(|status| NetworkStatus::new(online, status.connection));
    }

    /// Records a connection signal.
    pub fn update_connection(&self, connection: ConnectionInfo) {
        self.publish(|status| NetworkStatus::new(status.online, connection));
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn status(&self) -> NetworkStatus {
        *self.status_tx.borrow()
    }

    /// Returns the current quality.
    #[inline]
    #[must_use]
    pub fn quality(&self) -> ConnectionQuality {
        self.status().quality
    }

    /// Returns the timeout to apply to a request dispatched now.
    #[inline]
    #[must_use]
    pub fn recommended_timeout(&self) -> Duration {
        self.status().recommended_timeout
    }

    /// Returns `true` when the link is offline or slow.
    #[inline]
    #[must_use]
    pub fn is_slow(&self) -> bool {
        self.status().is_slow()
    }

    /// Subscribes to snapshots. The receiver starts at the current one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status_tx.subscribe()
    }

    /// Replaces the snapshot and notifies subscribers, even if unchanged.
    fn publish(&self, update: impl FnOnce(&NetworkStatus) -> NetworkStatus) {
        let mut previous = None;
        self.status_tx.send_modify(|status| {
            let next = update(status);
            previous = Some(status.quality);
            *status = next;
        });

        let current = self.status();
        if previous != Some(current.quality) {
            info!(
                quality = ?current.quality,
                online = current.online,
                timeout_ms = current.recommended_timeout.as_millis() as u64,
                "Network quality changed"
            );
        } else {
            debug!(quality = ?current.quality, "Network signal received");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
