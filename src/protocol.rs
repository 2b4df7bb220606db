//! Wire message types for the multiplexed channel.
//!
//! Every frame on a pooled connection is a JSON object. Outbound frames are
//! the caller's payload with two injected routing fields; inbound frames
//! echo the correlation id and carry the call result.
//!
//! # Format
//!
//! Outbound:
//! ```json
//! { "wsPath": "/ping/", "messageId": 7, ...caller payload fields }
//! ```
//!
//! Inbound:
//! ```json
//! { "id": 7, "result": ... }
//! ```
//!
//! Inbound fields beyond `id` and `result` are ignored.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::CorrelationId;

// ============================================================================
// CallFrame
// ============================================================================

/// An outbound service call frame.
///
/// The caller's payload object is flattened into the frame, alongside the
/// injected `wsPath` and `messageId` fields used by the remote end for
/// dispatch and by this client for correlation. Caller-supplied fields
/// under either of those names are discarded; the injected values always
/// win, so correlation cannot be broken by payload contents.
#[derive(Debug, Clone, Serialize)]
pub struct CallFrame {
    /// The method path the remote end dispatches on.
    #[serde(rename = "wsPath")]
    pub path: String,

    /// Correlation id echoed back in the response.
    #[serde(rename = "messageId")]
    pub correlation_id: CorrelationId,

    /// The caller's payload fields.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl CallFrame {
    /// Creates a frame for the given call.
    ///
    /// Payload entries named `wsPath` or `messageId` are dropped; they
    /// would otherwise serialize as duplicate keys and shadow the injected
    /// routing fields on last-wins parsers.
    #[must_use]
    pub fn new(path: &str, correlation_id: CorrelationId, mut payload: Map<String, Value>) -> Self {
        payload.remove("wsPath");
        payload.remove("messageId");

        Self {
            path: path.to_owned(),
            correlation_id,
            payload,
        }
    }

    /// Serializes the frame to its JSON text representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// ServiceResponse
// ============================================================================

/// An inbound response frame.
///
/// Frames that are not JSON objects with a numeric `id` fail to parse and
/// are dropped by the connection's inbound handler.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceResponse {
    /// The correlation id of the originating call.
    pub id: CorrelationId,

    /// Result data, absent when the server sent none.
    #[serde(default)]
    pub result: Option<Value>,
}

impl ServiceResponse {
    /// Parses a response from inbound frame text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) for malformed frames.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Extracts the result the call future resolves with.
    ///
    /// A response without a `result` field resolves to an empty array,
    /// so callers can always treat the result as present.
    #[inline]
    #[must_use]
    pub fn into_result(self) -> Value {
        self.result.unwrap_or_else(|| Value::Array(Vec::new()))
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
    fn test_call_frame_injects_routing_fields() {
        let mut payload = Map::new();
        payload.insert("query".to_owned(), json!("test-"));

        let frame = CallFrame::new("/autocomplete/", CorrelationId::from_u64(9), payload);
        let value: Value = serde_json::from_str(&frame.to_json().expect("serialize"))
            .expect("roundtrip");

        assert_eq!(value["wsPath"], "/autocomplete/");
        assert_eq!(value["messageId"], 9);
        assert_eq!(value["query"], "test-");
    }

    #[test]
    fn test_injected_fields_win_over_payload_collisions() {
        let mut payload = Map::new();
        payload.insert("wsPath".to_owned(), json!("/spoofed/"));
        payload.insert("messageId".to_owned(), json!(999));
        payload.insert("query".to_owned(), json!("q"));

        let frame = CallFrame::new("/real/", CorrelationId::from_u64(1), payload);
        let text = frame.to_json().expect("serialize");
        let value: Value = serde_json::from_str(&text).expect("roundtrip");

        assert_eq!(value["wsPath"], "/real/");
        assert_eq!(value["messageId"], 1);
        assert_eq!(value["query"], "q");

        // No duplicate keys survive on the wire.
        assert_eq!(text.matches("wsPath").count(), 1);
        assert_eq!(text.matches("messageId").count(), 1);
    }

    #[test]
    fn test_call_frame_with_empty_payload() {
        let frame = CallFrame::new("/ping/", CorrelationId::from_u64(1), Map::new());
        let value: Value = serde_json::from_str(&frame.to_json().expect("serialize"))
            .expect("roundtrip");

        assert_eq!(value.as_object().expect("object").len(), 2);
        assert!(value["messageId"].is_u64());
    }

    #[test]
    fn test_response_parses_id_and_result() {
        let response = ServiceResponse::parse(r#"{"id": 7, "result": "pong"}"#).expect("parse");
        assert_eq!(response.id, CorrelationId::from_u64(7));
        assert_eq!(response.into_result(), json!("pong"));
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let response = ServiceResponse::parse(r#"{"id": 7, "result": 1, "extra": true}"#)
            .expect("parse");
        assert_eq!(response.into_result(), json!(1));
    }

    #[test]
    fn test_missing_result_resolves_to_empty_array() {
        let response = ServiceResponse::parse(r#"{"id": 3}"#).expect("parse");
        assert_eq!(response.into_result(), json!([]));
    }

    #[test]
    fn test_response_requires_numeric_id() {
        assert!(ServiceResponse::parse(r#"{"id": "seven"}"#).is_err());
        assert!(ServiceResponse::parse(r#"{"result": "pong"}"#).is_err());
        assert!(ServiceResponse::parse("not json").is_err());
    }
}
