//! The event record: one observed protocol request or response.
//!
//! # Lifecycle
//!
//! ```text
//! protocol engine hook ──► NewEvent ──(ingress assigns sequence id)──► EventRecord
//! ```
//!
//! A [`NewEvent`] is what the tap builds from the engine's call arguments.  It
//! becomes an [`EventRecord`] exactly once, when the ingress path assigns the
//! next sequence number.  From then on the record is shared behind an `Arc`
//! and never mutated.
//!
//! # Serialized form
//!
//! Records are persisted one per line as JSON with camelCase field names:
//!
//! ```json
//! {"sequenceId":7,"kind":"response","eventType":"HeartbeatResponse",
//!  "timestamp":"2026-01-02T03:04:05.006Z","deviceId":"CS001",
//!  "correlationId":"T1","requestPayload":{},"responsePayload":{"currentTime":"..."},
//!  "runtimeMillis":12}
//! ```
//!
//! `kind` is stored explicitly because a response payload may legitimately be
//! JSON `null`, which would otherwise be indistinguishable from "absent".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::message_type::MessageType;

/// Whether a record captures the request half or the response half of an
/// exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Request,
    Response,
}

/// An immutable, sequenced record of one observed protocol occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Strictly increasing, gap-free position assigned at ingress.  This is
    /// the replay cursor observers hand back when they reconnect.
    pub sequence_id: u64,

    /// Request or response.
    pub kind: EventKind,

    /// Name of the protocol occurrence, e.g. `"BootNotificationRequest"`.
    pub event_type: String,

    /// When the engine observed the occurrence (UTC).
    pub timestamp: DateTime<Utc>,

    /// Identifier of the remote device the occurrence concerns.
    pub device_id: String,

    /// Shared by a request and its matching response.  Passed through
    /// unchanged; the bridge never validates the pairing.
    pub correlation_id: String,

    /// The request value.  Present on both request and response records.
    pub request_payload: Value,

    /// The response value.  `Some` only on response records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Value>,

    /// Elapsed time between request and response as computed by the engine.
    /// `Some` only on response records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_millis: Option<u64>,
}

impl EventRecord {
    /// Returns `true` for response records.
    pub fn is_response(&self) -> bool {
        self.kind == EventKind::Response
    }
}

/// A record that has been shaped by the tap but not yet sequenced.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub correlation_id: String,
    pub request_payload: Value,
    pub response_payload: Option<Value>,
    pub runtime_millis: Option<u64>,
}

impl NewEvent {
    /// Builds the request half of an exchange.
    ///
    /// The event type is the message type's statically known request name,
    /// e.g. `MessageType::Heartbeat` → `"HeartbeatRequest"`.
    pub fn request(
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device_id: impl Into<String>,
        correlation_id: impl Into<String>,
        request_payload: Value,
    ) -> Self {
        Self {
            kind: EventKind::Request,
            event_type: message_type.request_event_name(),
            timestamp,
            device_id: device_id.into(),
            correlation_id: correlation_id.into(),
            request_payload,
            response_payload: None,
            runtime_millis: None,
        }
    }

    /// Builds the response half of an exchange.
    pub fn response(
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device_id: impl Into<String>,
        correlation_id: impl Into<String>,
        request_payload: Value,
        response_payload: Value,
        runtime_millis: u64,
    ) -> Self {
        Self {
            kind: EventKind::Response,
            event_type: message_type.response_event_name(),
            timestamp,
            device_id: device_id.into(),
            correlation_id: correlation_id.into(),
            request_payload,
            response_payload: Some(response_payload),
            runtime_millis: Some(runtime_millis),
        }
    }

    /// Consumes the event and stamps it with its sequence id.
    pub fn into_record(self, sequence_id: u64) -> EventRecord {
        EventRecord {
            sequence_id,
            kind: self.kind,
            event_type: self.event_type,
            timestamp: self.timestamp,
            device_id: self.device_id,
            correlation_id: self.correlation_id,
            request_payload: self.request_payload,
            response_payload: self.response_payload,
            runtime_millis: self.runtime_millis,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap()
    }

    #[test]
    fn test_request_uses_request_event_name() {
        // Arrange / Act
        let event = NewEvent::request(MessageType::Heartbeat, ts(0), "CS001", "T1", json!({}));

        // Assert
        assert_eq!(event.event_type, "HeartbeatRequest");
        assert_eq!(event.kind, EventKind::Request);
        assert!(event.response_payload.is_none());
        assert!(event.runtime_millis.is_none());
    }

    #[test]
    fn test_response_carries_payload_and_runtime() {
        let event = NewEvent::response(
            MessageType::Reset,
            ts(12),
            "CS001",
            "T9",
            json!({"type": "Soft"}),
            json!({"status": "Accepted"}),
            12,
        );

        assert_eq!(event.event_type, "ResetResponse");
        assert_eq!(event.kind, EventKind::Response);
        assert_eq!(event.response_payload, Some(json!({"status": "Accepted"})));
        assert_eq!(event.runtime_millis, Some(12));
    }

    #[test]
    fn test_into_record_preserves_every_field() {
        // Arrange
        let event = NewEvent::response(
            MessageType::Authorize,
            ts(1_000),
            "CS002",
            "abc",
            json!({"idTag": "TAG"}),
            json!({"idTagInfo": {"status": "Accepted"}}),
            40,
        );

        // Act
        let record = event.clone().into_record(42);

        // Assert
        assert_eq!(record.sequence_id, 42);
        assert_eq!(record.event_type, event.event_type);
        assert_eq!(record.timestamp, event.timestamp);
        assert_eq!(record.device_id, "CS002");
        assert_eq!(record.correlation_id, "abc");
        assert_eq!(record.request_payload, event.request_payload);
        assert_eq!(record.response_payload, event.response_payload);
        assert_eq!(record.runtime_millis, Some(40));
        assert!(record.is_response());
    }

    #[test]
    fn test_request_record_omits_response_fields_in_json() {
        let record = NewEvent::request(MessageType::Heartbeat, ts(0), "CS001", "T1", json!({}))
            .into_record(1);

        let line = serde_json::to_string(&record).unwrap();

        assert!(!line.contains("responsePayload"));
        assert!(!line.contains("runtimeMillis"));
        assert!(line.contains("\"sequenceId\":1"));
        assert!(line.contains("\"kind\":\"request\""));
    }

    #[test]
    fn test_null_response_payload_keeps_response_kind_after_reload() {
        // A JSON-null response payload must not turn the record into a request.
        let record = NewEvent::response(
            MessageType::ClearCache,
            ts(0),
            "CS001",
            "T2",
            json!({}),
            Value::Null,
            3,
        )
        .into_record(5);

        let line = serde_json::to_string(&record).unwrap();
        let restored: EventRecord = serde_json::from_str(&line).unwrap();

        assert!(restored.is_response());
        assert_eq!(restored.runtime_millis, Some(3));
    }

    #[test]
    fn test_timestamp_serializes_as_iso8601_utc() {
        let record = NewEvent::request(
            MessageType::Heartbeat,
            ts(1_700_000_000_123),
            "CS001",
            "T1",
            json!({}),
        )
        .into_record(1);

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.123Z");
    }
}
