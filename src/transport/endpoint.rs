//! Socket URL normalization.
//!
//! Maps whatever the caller passes to a `ws://` or `wss://` URL:
//!
//! | Input | Result |
//! |-------|--------|
//! | `ws://host/p`, `wss://host/p` | unchanged |
//! | `http://host/p` | `ws://host/p` |
//! | `https://host/p` | `wss://host/p` |
//! | `/api/ws`, `api/ws`, `//host/p` | resolved against the page origin; `wss` on a secure page, `ws` otherwise |

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// PageContext
// ============================================================================

/// Origin and security context of the page hosting the client.
///
/// Scheme-less socket URLs are resolved against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    origin: Url,
}

impl PageContext {
    /// Creates a page context from an origin such as `https://admin.example.com`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin is not an `http(s)` URL.
    pub fn new(origin: &str) -> Result<Self> {
        let parsed = Url::parse(origin).map_err(|e| Error::invalid_url(origin, e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self { origin: parsed }),
            other => Err(Error::invalid_url(
                origin,
                format!("page origin must be http or https, got '{other}'"),
            )),
        }
    }

    /// Returns the page origin.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Returns `true` if the page was served over an encrypted scheme.
    #[inline]
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.origin.scheme() == "https"
    }

    /// Socket scheme matching the page security context.
    #[inline]
    #[must_use]
    pub fn socket_scheme(&self) -> &'static str {
        if self.is_secure() { "wss" } else { "ws" }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolves a caller-supplied socket URL.
///
/// # Errors
///
/// - [`Error::InvalidUrl`] if the URL cannot be parsed, uses an unsupported
///   scheme, or is relative while no page context is available
pub fn resolve_socket_url(raw: &str, page: Option<&PageContext>) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_url(raw, "empty URL"));
    }

    match Url::parse(trimmed) {
        Ok(url) => map_absolute(raw, url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let page = page.ok_or_else(|| {
                Error::invalid_url(raw, "relative socket URL requires a page context")
            })?;
            let mut url = page
                .origin()
                .join(trimmed)
                .map_err(|e| Error::invalid_url(raw, e.to_string()))?;
            set_scheme(raw, &mut url, page.socket_scheme())?;
            Ok(url)
        }
        Err(e) => Err(Error::invalid_url(raw, e.to_string())),
    }
}

/// Maps an absolute URL onto the matching socket scheme.
fn map_absolute(raw: &str, mut url: Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::invalid_url(
                raw,
                format!("unsupported scheme '{other}'"),
            ));
        }
    };

    set_scheme(raw, &mut url, scheme)?;
    Ok(url)
}

fn set_scheme(raw: &str, url: &mut Url, scheme: &str) -> Result<()> {
    url.set_scheme(scheme)
        .map_err(|()| Error::invalid_url(raw, format!("cannot switch to scheme '{scheme}'")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn insecure_page() -> PageContext {
        PageContext::new("http://admin.local:8080").expect("valid origin")
    }

    fn secure_page() -> PageContext {
        PageContext::new("https://admin.example.com").expect("valid origin")
    }

    #[test]
    fn test_relative_path_insecure_page() {
        let url = resolve_socket_url("/api/ws", Some(&insecure_page())).expect("resolve");
        assert_eq!(url.as_str(), "ws://admin.local:8080/api/ws");
    }

    #[test]
    fn test_relative_path_secure_page() {
        let url = resolve_socket_url("/api/ws", Some(&secure_page())).expect("resolve");
        assert_eq!(url.as_str(), "wss://admin.example.com/api/ws");
    }

    #[test]
    fn test_relative_path_keeps_query() {
        let url = resolve_socket_url("/api/ws?room=tasks", Some(&secure_page())).expect("resolve");
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/api/ws");
        assert_eq!(url.query(), Some("room=tasks"));
    }

    #[test]
    fn test_protocol_relative_url() {
        let url = resolve_socket_url("//push.example.com/events", Some(&secure_page()))
            .expect("resolve");
        assert_eq!(url.as_str(), "wss://push.example.com/events");
    }

    #[test]
    fn test_http_maps_to_ws() {
        let url = resolve_socket_url("http://host:3000/socket", None).expect("resolve");
        assert_eq!(url.as_str(), "ws://host:3000/socket");
    }

    #[test]
    fn test_https_maps_to_wss() {
        let url = resolve_socket_url("https://host/socket", None).expect("resolve");
        assert_eq!(url.as_str(), "wss://host/socket");
    }

    #[test]
    fn test_socket_schemes_unchanged() {
        let url = resolve_socket_url("wss://host/socket", Some(&insecure_page())).expect("resolve");
        assert_eq!(url.as_str(), "wss://host/socket");
        let url = resolve_socket_url("ws://host/socket", Some(&secure_page())).expect("resolve");
        assert_eq!(url.as_str(), "ws://host/socket");
    }

    #[test]
    fn test_relative_without_page_fails() {
        let err = resolve_socket_url("/api/ws", None).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
    }

    #[test]
    fn test_unsupported_scheme_fails() {
        assert!(resolve_socket_url("ftp://host/x", None).is_err());
        assert!(resolve_socket_url("   ", None).is_err());
    }

    #[test]
    fn test_page_context_rejects_socket_origin() {
        assert!(PageContext::new("ws://host").is_err());
        assert!(PageContext::new("nonsense").is_err());
        assert!(secure_page().is_secure());
        assert!(!insecure_page().is_secure());
    }
}
