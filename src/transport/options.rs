//! Connection configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use resilient_client::{ConnectionOptions, PageContext};
//!
//! let options = ConnectionOptions::new()
//!     .with_reconnect_attempts(10)
//!     .with_reconnect_interval(Duration::from_secs(2))
//!     .with_page(PageContext::new("https://admin.example.com")?);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

use super::endpoint::PageContext;

// ============================================================================
// Constants
// ============================================================================

/// Default reconnect attempt budget.
pub const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;

/// Default fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(3000);

/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Reconnect policy and URL context for a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Reconnect attempts allowed after consecutive closes.
    pub reconnect_attempts: u32,

    /// Fixed delay before each reconnect attempt.
    pub reconnect_interval: Duration,

    /// Upper bound on one connect attempt; a timed-out attempt counts as a close.
    pub connect_timeout: Duration,

    /// Page context used to resolve scheme-less URLs.
    pub page: Option<PageContext>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            page: None,
        }
    }

    /// Creates options that never reconnect automatically.
    #[inline]
    #[must_use]
    pub fn no_reconnect() -> Self {
        Self {
            reconnect_attempts: 0,
            ..Self::new()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the reconnect attempt budget.
    #[inline]
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the delay before each reconnect attempt.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the connect attempt timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the page context for relative URLs.
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: PageContext) -> Self {
        self.page = Some(page);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the connect timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
