//! Engine feed: lifecycle notifications from an out-of-process protocol
//! engine.
//!
//! An engine that cannot link the bridge as a library connects over TCP and
//! writes one JSON object per line:
//!
//! ```text
//! {"phase":"request","messageType":"Heartbeat","timestamp":"2026-01-02T03:04:05Z",
//!  "deviceId":"CS001","correlationId":"T1","request":{}}
//! {"phase":"response","messageType":"Heartbeat","timestamp":"2026-01-02T03:04:05.012Z",
//!  "deviceId":"CS001","correlationId":"T1","request":{},"response":{...},"runtimeMillis":12}
//! ```
//!
//! Each line is handed to a [`ProtocolObserver`] exactly as an in-process
//! engine would call it.  A malformed line is logged and skipped; the
//! connection stays open.  Nothing is ever written back to the engine.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use event_bridge_core::{MessageType, UnknownMessageType};

use crate::application::tap::{DeviceContext, ProtocolObserver};

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// A feed line that could not be turned into a notification.
#[derive(Debug, Error)]
pub enum FeedLineError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    MessageType(#[from] UnknownMessageType),
}

/// One line of the feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum FeedLine {
    #[serde(rename_all = "camelCase")]
    Request {
        message_type: String,
        timestamp: DateTime<Utc>,
        device_id: String,
        correlation_id: String,
        #[serde(default)]
        request: Value,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        message_type: String,
        timestamp: DateTime<Utc>,
        device_id: String,
        correlation_id: String,
        #[serde(default)]
        request: Value,
        #[serde(default)]
        response: Value,
        runtime_millis: u64,
    },
}

/// The device a feed line concerns, as seen from this connection.
struct FeedDevice<'a> {
    device_id: &'a str,
    engine: SocketAddr,
}

impl DeviceContext for FeedDevice<'_> {
    fn device_id(&self) -> &str {
        self.device_id
    }

    fn describe(&self) -> Value {
        json!({ "deviceId": self.device_id, "engine": self.engine.to_string() })
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `addr` and runs [`serve_engine_feed`] until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_engine_feed(
    addr: SocketAddr,
    observer: Arc<dyn ProtocolObserver>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind engine feed listener on {addr}"))?;
    info!("engine feed listening on {addr}");
    serve_engine_feed(listener, observer, running).await
}

/// Accepts engine connections on `listener`, one task per connection.
pub async fn serve_engine_feed(
    listener: TcpListener,
    observer: Arc<dyn ProtocolObserver>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    while running.load(Ordering::Relaxed) {
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("engine connected from {peer}");
                let observer = Arc::clone(&observer);
                tokio::spawn(async move {
                    match read_feed(stream, peer, observer.as_ref()).await {
                        Ok(lines) => info!("engine {peer} disconnected after {lines} line(s)"),
                        Err(e) => warn!("engine {peer} connection failed: {e:#}"),
                    }
                });
            }
            Ok(Err(e)) => error!("engine feed accept error: {e}"),
            Err(_) => {}
        }
    }
    info!("engine feed stopped");
    Ok(())
}

/// Parses one feed line and passes it to `observer`.
///
/// # Errors
///
/// Returns [`FeedLineError`] if the line is not a valid notification.  The
/// observer is not called in that case.
pub fn dispatch_line(
    line: &str,
    engine: SocketAddr,
    observer: &dyn ProtocolObserver,
) -> Result<(), FeedLineError> {
    match serde_json::from_str::<FeedLine>(line)? {
        FeedLine::Request {
            message_type,
            timestamp,
            device_id,
            correlation_id,
            request,
        } => {
            let message_type = MessageType::from_str(&message_type)?;
            let device = FeedDevice {
                device_id: &device_id,
                engine,
            };
            observer.on_request(message_type, timestamp, &device, &request, &correlation_id);
        }
        FeedLine::Response {
            message_type,
            timestamp,
            device_id,
            correlation_id,
            request,
            response,
            runtime_millis,
        } => {
            let message_type = MessageType::from_str(&message_type)?;
            let device = FeedDevice {
                device_id: &device_id,
                engine,
            };
            observer.on_response(
                message_type,
                timestamp,
                &device,
                &request,
                &response,
                &correlation_id,
                Duration::from_millis(runtime_millis),
            );
        }
    }
    Ok(())
}

// ── Per-connection reader ─────────────────────────────────────────────────────

async fn read_feed(
    stream: TcpStream,
    peer: SocketAddr,
    observer: &dyn ProtocolObserver,
) -> anyhow::Result<u64> {
    let mut lines = BufReader::new(stream).lines();
    let mut count = 0u64;

    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("reading from engine {peer}"))?
    {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;
        if let Err(e) = dispatch_line(&line, peer, observer) {
            warn!("engine {peer}: dropping line {count}: {e}");
        } else {
            debug!("engine {peer}: line {count} dispatched");
        }
    }

    Ok(count)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
