//! HTTP server: SSE subscription endpoint, record query, health and the
//! bundled viewer.
//!
//! | Route                     | Response                                        |
//! |---------------------------|-------------------------------------------------|
//! | `GET /events`             | `text/event-stream` of every record             |
//! | `GET /api/events`         | JSON array of retained wire messages            |
//! | `GET /api/health`         | buffer and delivery statistics                  |
//! | `GET /api/subscribers`    | one snapshot per connected subscriber           |
//! | `GET /api/message-types`  | every event name the stream can carry           |
//! | anything else             | static resource lookup (`/` → `index.html`)     |
//!
//! # Resuming
//!
//! `GET /events` replays every retained record after the client's last seen
//! id, taken from the `Last-Event-ID` header (sent automatically by
//! `EventSource` on reconnect) or else from the `lastEventId` query
//! parameter.  Without either, replay starts from the oldest retained record.
//!
//! Each SSE event carries `id:` (the sequence id), `event:` (the event type),
//! `retry:` (the reconnect hint) and `data:` (the JSON payload).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use event_bridge_core::{MessageType, WireMessage};

use crate::application::{BridgeHealth, DeliveryError, EventBridge};
use crate::domain::SubscriberSnapshot;
use crate::infrastructure::resources::ResourceLookup;

/// Records returned by `GET /api/events` when no `limit` is given.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Upper bound on `limit` for `GET /api/events`.
pub const MAX_QUERY_LIMIT: usize = 1000;

/// How often the graceful-shutdown future re-checks the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Shared state for every handler.
#[derive(Clone)]
pub struct HttpState {
    pub bridge: Arc<EventBridge>,
    pub resources: Arc<dyn ResourceLookup>,
}

/// Error type for HTTP handlers.
#[derive(Debug)]
enum ApiError {
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DeliveryError> for ApiError {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::TooManySubscribers { .. } => Self::Unavailable(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Builds the router.
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/events", get(stream_events))
        .route("/api/events", get(query_events))
        .route("/api/health", get(health))
        .route("/api/subscribers", get(subscribers))
        .route("/api/message-types", get(message_types))
        .fallback(static_resource)
        .with_state(state)
}

/// Binds `addr` and runs [`serve_http`] until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_http_server(
    addr: SocketAddr,
    state: HttpState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!("HTTP server listening on {addr}");
    serve_http(listener, state, running).await
}

/// Serves HTTP on an already bound listener.
pub async fn serve_http(
    listener: TcpListener,
    state: HttpState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(SHUTDOWN_POLL).await;
            }
        })
        .await
        .context("HTTP server failed")?;
    info!("HTTP server stopped");
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamParams {
    last_event_id: Option<u64>,
}

async fn stream_events(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let last_seen = last_event_id(&headers).or(params.last_event_id);
    let subscription = state.bridge.subscribe(last_seen)?;
    debug!(
        "SSE subscriber {} attached, last seen {last_seen:?}",
        subscription.id()
    );

    let events = subscription.map(|message| sse_event(&message));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Default, Deserialize)]
struct QueryParams {
    after: Option<u64>,
    limit: Option<usize>,
}

async fn query_events(
    State(state): State<HttpState>,
    Query(params): Query<QueryParams>,
) -> Json<Vec<WireMessage>> {
    let limit = clamp_limit(params.limit);
    let retry = state.bridge.broadcaster().retry_interval();
    let buffer = state.bridge.buffer();
    let after = params.after.unwrap_or(0).min(buffer.last_sequence_id());

    let mut backlog = buffer.read_from(after).await;
    let mut messages = Vec::new();
    while messages.len() < limit {
        let Some(record) = backlog.next_record().await else {
            break;
        };
        messages.push(WireMessage::from_record(&record, retry));
    }
    Json(messages)
}

async fn health(State(state): State<HttpState>) -> Json<BridgeHealth> {
    Json(state.bridge.health())
}

async fn subscribers(State(state): State<HttpState>) -> Json<Vec<SubscriberSnapshot>> {
    let mut snapshots = state.bridge.broadcaster().snapshots();
    snapshots.sort_by_key(|s| s.cursor);
    Json(snapshots)
}

async fn message_types() -> Json<Vec<String>> {
    Json(
        MessageType::ALL
            .iter()
            .flat_map(|t| [t.request_event_name(), t.response_event_name()])
            .collect(),
    )
}

async fn static_resource(State(state): State<HttpState>, uri: Uri) -> Response {
    match state.resources.lookup(uri.path()) {
        Some(resource) => (
            [(header::CONTENT_TYPE, resource.content_type)],
            resource.bytes.into_owned(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Reads the `Last-Event-ID` header.  A malformed value is ignored.
fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get("last-event-id")?;
    match value.to_str().ok().and_then(|v| v.trim().parse().ok()) {
        Some(id) => Some(id),
        None => {
            warn!("ignoring malformed Last-Event-ID header {value:?}");
            None
        }
    }
}

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT)
}

fn sse_event(message: &WireMessage) -> Result<Event, axum::Error> {
    Event::default()
        .id(message.id.to_string())
        .event(&message.event)
        .retry(message.retry_interval())
        .json_data(&message.data)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
