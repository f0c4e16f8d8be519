//! Type-safe identifiers.
//!
//! | Type | Origin | Used by |
//! |------|--------|---------|
//! | [`RequestId`] | Caller-supplied string | Cancellation registry, request manager |
//! | [`HandlerId`] | Allocated by the connection | `Connection::on` / `Connection::off` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Logical request identifier.
///
/// Supplied by the caller (for example `"task-42"` or `"billing-export"`).
/// Ids are compared by exact value or by prefix, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Creates a request id from a caller-supplied string.
    #[inline]
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Generates a unique id with the given prefix.
    ///
    /// Format: `{prefix}{uuid-v4}`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self::new(format!("{prefix}{}", Uuid::new_v4()))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id starts with `prefix`.
    #[inline]
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    #[inline]
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    #[inline]
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&String> for RequestId {
    #[inline]
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

// ============================================================================
// HandlerId
// ============================================================================

/// Next handler id, process-wide.
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one registered event handler.
///
/// Returned by `Connection::on`; pass it to `Connection::off` to remove
/// exactly that handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Allocates a fresh handler id.
    #[inline]
    #[must_use]
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_prefix() {
        let id = RequestId::new("task-17");
        assert!(id.has_prefix("task-"));
        assert!(!id.has_prefix("billing-"));
        assert_eq!(id.as_str(), "task-17");
    }

    #[test]
    fn test_request_id_generate_is_unique() {
        let a = RequestId::generate("perm-");
        let b = RequestId::generate("perm-");
        assert_ne!(a, b);
        assert!(a.has_prefix("perm-"));
    }

    #[test]
    fn test_request_id_conversions() {
        let from_str: RequestId = "x".into();
        let from_string: RequestId = String::from("x").into();
        assert_eq!(from_str, from_string);
        assert_eq!(from_str.to_string(), "x");
    }

    #[test]
    fn test_handler_ids_are_distinct() {
        let a = HandlerId::next();
        let b = HandlerId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }
}
