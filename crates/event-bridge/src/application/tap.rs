//! Protocol event tap: turns protocol engine lifecycle notifications into
//! records.
//!
//! The engine calls [`ProtocolObserver::on_request`] when it sends or receives
//! a request and [`ProtocolObserver::on_response`] when the matching response
//! completes, for every [`MessageType`] in either direction.  The message type
//! selects the hook's statically known event name (`"ResetRequest"`,
//! `"ResetResponse"`, ...).
//!
//! Hooks never fail from the engine's point of view.  Anything that goes wrong
//! while shaping or submitting a record is logged and the record is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{trace, warn};

use event_bridge_core::{MessageType, NewEvent};

use crate::application::ingress::IngressError;

/// A record could not be built or submitted.
#[derive(Debug, Error)]
pub enum TapError {
    #[error("{event_type}: device context has no device id")]
    MissingDeviceId { event_type: String },

    #[error("{event_type} from {device_id}: missing correlation id")]
    MissingCorrelationId {
        event_type: String,
        device_id: String,
    },

    #[error("runtime of {runtime:?} does not fit in milliseconds")]
    RuntimeOutOfRange { runtime: Duration },

    #[error("payload is not representable as JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("submit failed: {0}")]
    Submit(#[from] IngressError),
}

/// The engine's view of the remote device a message concerns.
pub trait DeviceContext: Send + Sync {
    /// Stable identifier of the device.
    fn device_id(&self) -> &str;

    /// JSON representation of the context, used in diagnostics.
    fn describe(&self) -> Value;
}

/// Where shaped records go.  Implemented by [`Ingress`](crate::application::Ingress).
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn submit(&self, event: NewEvent) -> Result<u64, IngressError>;
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn submit(&self, event: NewEvent) -> Result<u64, IngressError> {
        (**self).submit(event)
    }
}

/// Lifecycle notifications the protocol engine delivers for every message
/// exchange.
pub trait ProtocolObserver: Send + Sync {
    fn on_request(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &Value,
        correlation_id: &str,
    );

    /// Called at most once per `on_request`, with the same correlation id.
    #[allow(clippy::too_many_arguments)]
    fn on_response(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &Value,
        response: &Value,
        correlation_id: &str,
        runtime: Duration,
    );
}

/// [`ProtocolObserver`] that submits one record per notification to an
/// [`EventSink`].
pub struct EventTap<S> {
    sink: S,
}

impl<S: EventSink> EventTap<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Serializes a typed request and reports it like
    /// [`ProtocolObserver::on_request`].
    pub fn observe_request<T: Serialize>(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &T,
        correlation_id: &str,
    ) {
        match serde_json::to_value(request) {
            Ok(request) => {
                self.on_request(message_type, timestamp, device, &request, correlation_id)
            }
            Err(e) => report(&message_type.request_event_name(), device, &e.into()),
        }
    }

    /// Serializes a typed request/response pair and reports it like
    /// [`ProtocolObserver::on_response`].
    #[allow(clippy::too_many_arguments)]
    pub fn observe_response<Req: Serialize, Resp: Serialize>(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &Req,
        response: &Resp,
        correlation_id: &str,
        runtime: Duration,
    ) {
        let values = serde_json::to_value(request)
            .and_then(|req| Ok((req, serde_json::to_value(response)?)));
        match values {
            Ok((request, response)) => self.on_response(
                message_type,
                timestamp,
                device,
                &request,
                &response,
                correlation_id,
                runtime,
            ),
            Err(e) => report(&message_type.response_event_name(), device, &e.into()),
        }
    }

    fn submit(&self, event: NewEvent) -> Result<u64, TapError> {
        let event_type = event.event_type.clone();
        let sequence_id = self.sink.submit(event)?;
        trace!("{event_type} recorded as {sequence_id}");
        Ok(sequence_id)
    }
}

impl<S: EventSink> ProtocolObserver for EventTap<S> {
    fn on_request(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &Value,
        correlation_id: &str,
    ) {
        let result = shape_request(message_type, timestamp, device, request, correlation_id)
            .and_then(|event| self.submit(event));
        if let Err(e) = result {
            report(&message_type.request_event_name(), device, &e);
        }
    }

    fn on_response(
        &self,
        message_type: MessageType,
        timestamp: DateTime<Utc>,
        device: &dyn DeviceContext,
        request: &Value,
        response: &Value,
        correlation_id: &str,
        runtime: Duration,
    ) {
        let result = shape_response(
            message_type,
            timestamp,
            device,
            request,
            response,
            correlation_id,
            runtime,
        )
        .and_then(|event| self.submit(event));
        if let Err(e) = result {
            report(&message_type.response_event_name(), device, &e);
        }
    }
}

fn shape_request(
    message_type: MessageType,
    timestamp: DateTime<Utc>,
    device: &dyn DeviceContext,
    request: &Value,
    correlation_id: &str,
) -> Result<NewEvent, TapError> {
    let event_type = message_type.request_event_name();
    let device_id = require_ids(&event_type, device, correlation_id)?;
    Ok(NewEvent::request(
        message_type,
        timestamp,
        device_id,
        correlation_id,
        request.clone(),
    ))
}

#[allow(clippy::too_many_arguments)]
fn shape_response(
    message_type: MessageType,
    timestamp: DateTime<Utc>,
    device: &dyn DeviceContext,
    request: &Value,
    response: &Value,
    correlation_id: &str,
    runtime: Duration,
) -> Result<NewEvent, TapError> {
    let event_type = message_type.response_event_name();
    let device_id = require_ids(&event_type, device, correlation_id)?;
    let runtime_millis = u64::try_from(runtime.as_millis())
        .map_err(|_| TapError::RuntimeOutOfRange { runtime })?;
    Ok(NewEvent::response(
        message_type,
        timestamp,
        device_id,
        correlation_id,
        request.clone(),
        response.clone(),
        runtime_millis,
    ))
}

fn require_ids<'a>(
    event_type: &str,
    device: &'a dyn DeviceContext,
    correlation_id: &str,
) -> Result<&'a str, TapError> {
    let device_id = device.device_id();
    if device_id.trim().is_empty() {
        return Err(TapError::MissingDeviceId {
            event_type: event_type.to_string(),
        });
    }
    if correlation_id.trim().is_empty() {
        return Err(TapError::MissingCorrelationId {
            event_type: event_type.to_string(),
            device_id: device_id.to_string(),
        });
    }
    Ok(device_id)
}

fn report(event_type: &str, device: &dyn DeviceContext, error: &TapError) {
    warn!(
        device = %device.describe(),
        "dropping {event_type}: {error}"
    );
}

// ── Tests ─────────────────────────────────────────────────────────────────────
