//! WebSocket server: accept loop and per-subscriber sessions.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket session, reading the optional
//!    `lastEventId` query parameter from the upgrade request
//!    (`ws://host:8181/?lastEventId=50`).
//! 3. Opening a subscription for the session and writing every wire message
//!    to the socket as one JSON text frame.
//! 4. Closing the socket when the subscription ends (shed or shutdown) and
//!    cancelling the subscription when the observer goes away.
//! 5. Stopping the accept loop when the `running` flag is cleared.
//!
//! Observers never send anything meaningful; inbound text and binary frames
//! are ignored.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use crate::application::EventBridge;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `addr` and runs [`serve_ws`] until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_ws_server(
    addr: SocketAddr,
    bridge: Arc<EventBridge>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
    info!("WebSocket endpoint listening on {addr}");
    serve_ws(listener, bridge, running).await
}

/// Accepts WebSocket subscribers on an already bound listener.
pub async fn serve_ws(
    listener: TcpListener,
    bridge: Arc<EventBridge>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping WebSocket accept loop");
            break;
        }

        // Time out so the loop notices the shutdown flag with no traffic.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new WebSocket connection from {peer_addr}");
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    handle_session(stream, peer_addr, bridge).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. out of file descriptors); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

async fn handle_session(raw_stream: TcpStream, peer_addr: SocketAddr, bridge: Arc<EventBridge>) {
    match run_session(raw_stream, peer_addr, bridge).await {
        Ok(()) => info!("WebSocket session {peer_addr} closed"),
        Err(e) => warn!("WebSocket session {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    bridge: Arc<EventBridge>,
) -> anyhow::Result<()> {
    // ── Step 1: handshake, capturing the resume position ──────────────────────
    let mut last_seen = None;
    let ws_stream = accept_hdr_async(raw_stream, |request: &Request, response: Response| {
        last_seen = last_event_id(request.uri().query());
        Ok::<_, ErrorResponse>(response)
    })
    .await
    .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    // ── Step 2: subscribe ─────────────────────────────────────────────────────
    let mut subscription = match bridge.subscribe(last_seen) {
        Ok(subscription) => subscription,
        Err(e) => {
            let close = CloseFrame {
                code: CloseCode::Again,
                reason: Cow::Owned(e.to_string()),
            };
            ws_tx.send(WsMessage::Close(Some(close))).await.ok();
            return Err(e).context("subscription refused");
        }
    };
    info!(
        "WebSocket session {peer_addr} is subscriber {}, last seen {last_seen:?}",
        subscription.id()
    );

    // ── Step 3: forward until either side ends ────────────────────────────────
    loop {
        tokio::select! {
            message = subscription.recv_pending() => {
                let Some(message) = message else {
                    // Shed or shutting down; the observer reconnects with its
                    // last id.
                    let close = CloseFrame {
                        code: CloseCode::Restart,
                        reason: Cow::Borrowed("subscription ended"),
                    };
                    ws_tx.send(WsMessage::Close(Some(close))).await.ok();
                    break;
                };
                let text = serde_json::to_string(&message)
                    .context("serializing wire message")?;
                if ws_tx.send(WsMessage::Text(text)).await.is_err() {
                    debug!("session {peer_addr}: send failed (observer disconnected)");
                    break;
                }
                subscription.mark_delivered(message.id);
            }
            inbound = ws_rx.next() => {
                match inbound {
                    Some(Ok(WsMessage::Close(_))) | None => {
                        debug!("session {peer_addr}: observer closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => break,
                    Some(Err(e)) => {
                        warn!("session {peer_addr}: WebSocket error: {e}");
                        break;
                    }
                }
            }
        }
    }

    // Dropping the subscription cancels its delivery task.
    drop(subscription);
    Ok(())
}

// ── Helper ────────────────────────────────────────────────────────────────────

/// Extracts `lastEventId` from a request query string.
fn last_event_id(query: Option<&str>) -> Option<u64> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("lastEventId="))
        .and_then(|value| value.parse().ok())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
