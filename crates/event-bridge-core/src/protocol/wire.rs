//! Observer-facing wire encoding of event records.
//!
//! Each delivered record becomes one [`WireMessage`]: a transport envelope
//! (delivery id, event name, reconnect hint) around a [`WirePayload`] whose
//! fields are the record's observer-visible data.
//!
//! # Payload shape
//!
//! ```json
//! { "timestamp": "2026-01-02T03:04:05Z", "deviceId": "CS001",
//!   "eventTrackingId": "T1", "request": {...},
//!   "response": {...}, "runtime": 12 }
//! ```
//!
//! `response` and `runtime` appear only for response records.
//!
//! # Transports
//!
//! The SSE endpoint maps the envelope onto the `id:`, `event:`, `retry:` and
//! `data:` lines of a server-sent event.  The WebSocket endpoint sends the
//! whole envelope as one JSON text frame.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::record::{EventKind, EventRecord};

/// The data portion of a delivered record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayload {
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    /// The record's correlation id.
    pub event_tracking_id: String,
    pub request: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Runtime in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<u64>,
}

/// One record as delivered to an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Delivery id; always equal to the record's sequence id.
    pub id: u64,
    /// Transport-level event name; the record's event type.
    pub event: String,
    /// How long the observer should wait before reconnecting if the channel
    /// drops, in milliseconds.
    pub retry: u64,
    pub data: WirePayload,
}

impl WireMessage {
    /// Renders `record` for delivery, attaching the reconnect hint.
    pub fn from_record(record: &EventRecord, retry: Duration) -> Self {
        // Response-only fields are taken from the record only for response
        // records so a request never leaks a stray value onto the wire.
        let (response, runtime) = match record.kind {
            EventKind::Request => (None, None),
            EventKind::Response => (
                Some(record.response_payload.clone().unwrap_or(Value::Null)),
                record.runtime_millis,
            ),
        };

        Self {
            id: record.sequence_id,
            event: record.event_type.clone(),
            retry: u64::try_from(retry.as_millis()).unwrap_or(u64::MAX),
            data: WirePayload {
                timestamp: record.timestamp,
                device_id: record.device_id.clone(),
                event_tracking_id: record.correlation_id.clone(),
                request: record.request_payload.clone(),
                response,
                runtime,
            },
        }
    }

    /// The reconnect hint as a `Duration`.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
