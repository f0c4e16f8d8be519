//! Event envelope carried by every socket frame.
//!
//! # Format
//!
//! ```json
//! { "event": "task.updated", "data": { "id": 42 } }
//! ```
//!
//! Outbound frames always use `event`. Inbound parsing also accepts the
//! older `type` field name when `event` is absent.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value, from_str, to_string};
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Reserved Events
// ============================================================================

/// Fired when the transport opens (payload `null`).
pub const CONNECT_EVENT: &str = "connect";

/// Fired when the transport closes (payload `null`).
pub const DISCONNECT_EVENT: &str = "disconnect";

/// Fired on transport errors (payload `{"message": ...}`).
pub const ERROR_EVENT: &str = "error";

/// Returns `true` for names the connection fires itself.
#[inline]
#[must_use]
pub fn is_reserved(event: &str) -> bool {
    matches!(event, CONNECT_EVENT | DISCONNECT_EVENT | ERROR_EVENT)
}

// ============================================================================
// Envelope
// ============================================================================

/// A named event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Event name.
    pub event: String,

    /// Event payload (`null` when absent).
    pub data: Value,
}

impl Envelope {
    /// Creates a new envelope.
    #[inline]
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Parses an inbound text frame.
    ///
    /// `type` is only consulted when `event` is absent, so a stray non-string
    /// `type` next to a valid `event` is ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not valid JSON
    /// - [`Error::Protocol`] if the frame is not a JSON object, or neither
    ///   `event` nor `type` names the event with a non-empty string
    pub fn parse(text: &str) -> Result<Self> {
        let Value::Object(mut fields) = from_str::<Value>(text)? else {
            return Err(Error::protocol("envelope is not a JSON object"));
        };

        let event = Self::event_name(&mut fields)?;

        if event.is_empty() {
            return Err(Error::protocol("envelope has an empty event name"));
        }

        Ok(Self {
            event,
            data: fields.remove("data").unwrap_or(Value::Null),
        })
    }

    fn event_name(fields: &mut Map<String, Value>) -> Result<String> {
        match fields.remove("event") {
            Some(Value::String(event)) => Ok(event),
            Some(_) => Err(Error::protocol("envelope 'event' is not a string")),
            None => match fields.remove("type") {
                Some(Value::String(legacy)) => {
                    trace!(event = %legacy, "Envelope uses legacy 'type' field");
                    Ok(legacy)
                }
                Some(_) => Err(Error::protocol("envelope 'type' is not a string")),
                None => Err(Error::protocol("envelope has no event name")),
            },
        }
    }

    /// Serializes the envelope to a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_canonical() {
        let env = Envelope::parse(r#"{"event":"task.updated","data":{"id":42}}"#)
            .expect("parse");
        assert_eq!(env.event, "task.updated");
        assert_eq!(env.data, json!({"id": 42}));
    }

    #[test]
    fn test_parse_legacy_type_field() {
        let env = Envelope::parse(r#"{"type":"billing.paid","data":[1,2]}"#).expect("parse");
        assert_eq!(env.event, "billing.paid");
        assert_eq!(env.data, json!([1, 2]));
    }

    #[test]
    fn test_event_field_wins_over_type() {
        let env = Envelope::parse(r#"{"event":"a","type":"b"}"#).expect("parse");
        assert_eq!(env.event, "a");
        assert_eq!(env.data, Value::Null);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse("[1,2,3]").is_err());
        assert!(Envelope::parse(r#"{"data":1}"#).is_err());
        assert!(Envelope::parse(r#"{"event":""}"#).is_err());
        assert!(Envelope::parse(r#"{"event":5}"#).is_err());
        assert!(Envelope::parse(r#"{"type":5}"#).is_err());
        assert!(Envelope::parse("null").is_err());
        assert!(Envelope::parse(r#""target""#).is_err());
    }

    #[test]
    fn test_parse_rejects_non_object_frames() {
        assert!(Envelope::parse(r#"["target"]"#).is_err());
        assert!(Envelope::parse(r#"["task.updated", null, {"id":7}]"#).is_err());
    }

    #[test]
    fn test_event_wins_over_non_string_type() {
        let env = Envelope::parse(r#"{"event":"x","type":5,"data":true}"#).expect("parse");
        assert_eq!(env.event, "x");
        assert_eq!(env.data, Value::Bool(true));
    }

    #[test]
    fn test_to_frame_uses_event_field() {
        let frame = Envelope::new("ping", json!({"t": 1}))
            .to_frame()
            .expect("serialize");
        let value: Value = serde_json::from_str(&frame).expect("json");
        assert_eq!(value, json!({"event": "ping", "data": {"t": 1}}));
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("connect"));
        assert!(is_reserved("disconnect"));
        assert!(is_reserved("error"));
        assert!(!is_reserved("message"));
    }
}
