//! Event bridge: entry point.
//!
//! Captures every request and response a protocol engine exchanges with its
//! field devices and streams them, in order, to any number of observers.
//! Observers that connect late or reconnect replay what they missed from
//! their last seen id.
//!
//! # Usage
//!
//! ```text
//! event-bridge [OPTIONS]
//!
//! Options:
//!   --config <FILE>          TOML configuration file
//!   --http-bind <ADDR>       SSE / query / health listener [default: 0.0.0.0:8180]
//!   --ws-bind <ADDR>         WebSocket listener [default: 0.0.0.0:8181]
//!   --engine-bind <ADDR>     Engine feed listener [default: 127.0.0.1:8182]
//!   --capacity <N>           Records kept in memory [default: 10000]
//!   --log-path <FILE>        Append-only event log [default: events.jsonl]
//!   --queue-depth <N>        Per-subscriber live queue [default: 1024]
//!   --max-subscribers <N>    Connection limit [default: 256]
//!   --retry-ms <MS>          Reconnect hint sent to observers [default: 3000]
//!   --log-level <FILTER>     tracing filter [default: info]
//! ```
//!
//! # Precedence
//!
//! Command-line flag, then environment variable (`EVENT_BRIDGE_*`, or
//! `RUST_LOG` for the log filter), then the `--config` file, then the
//! built-in default.
//!
//! # Architecture overview
//!
//! ```text
//! protocol engine ──(in-process ProtocolObserver or TCP engine feed)──┐
//!                                                                     ▼
//! event-bridge  ← this process
//!   domain/          BridgeConfig, subscriber states
//!   application/     tap → ingress → ring buffer → broadcaster
//!   infrastructure/  event log, HTTP (SSE), WebSocket, engine feed, config file
//!                                                                     │
//! observers  ◄──(SSE on /events, or WebSocket)────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use event_bridge::application::{EventBridge, ProtocolObserver};
use event_bridge::domain::BridgeConfig;
use event_bridge::infrastructure::config_file::FileConfig;
use event_bridge::infrastructure::http_server::{run_http_server, HttpState};
use event_bridge::infrastructure::resources::EmbeddedResources;
use event_bridge::infrastructure::{run_engine_feed, run_ws_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Durable, replayable broadcast of protocol engine traffic.
///
/// Every flag is optional; unset flags fall back to the environment, then the
/// configuration file, then the built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(
    name = "event-bridge",
    about = "Durable, replayable broadcast of protocol engine traffic to live observers",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "EVENT_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Address for the HTTP server (SSE subscriptions, record query, health).
    #[arg(long, env = "EVENT_BRIDGE_HTTP_BIND")]
    http_bind: Option<SocketAddr>,

    /// Address for the WebSocket subscription endpoint.
    #[arg(long, env = "EVENT_BRIDGE_WS_BIND")]
    ws_bind: Option<SocketAddr>,

    /// Address on which an out-of-process engine streams notifications.
    ///
    /// The feed is unauthenticated; keep it on loopback unless the engine
    /// runs elsewhere on a trusted network.
    #[arg(long, env = "EVENT_BRIDGE_ENGINE_BIND")]
    engine_bind: Option<SocketAddr>,

    /// Number of most-recent records kept in memory.
    #[arg(long, env = "EVENT_BRIDGE_CAPACITY")]
    capacity: Option<usize>,

    /// Path of the append-only event log.
    #[arg(long, env = "EVENT_BRIDGE_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// Records a live subscriber may have queued before it is shed.
    #[arg(long, env = "EVENT_BRIDGE_QUEUE_DEPTH")]
    queue_depth: Option<usize>,

    /// Maximum number of concurrently connected subscribers.
    #[arg(long, env = "EVENT_BRIDGE_MAX_SUBSCRIBERS")]
    max_subscribers: Option<usize>,

    /// Reconnect hint sent with every record, in milliseconds.
    #[arg(long, env = "EVENT_BRIDGE_RETRY_MS")]
    retry_ms: Option<u64>,

    /// `tracing` filter, e.g. `info` or `event_bridge=debug`.  Overrides
    /// `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Applies every flag that was given on top of `base`.
    fn apply(&self, base: BridgeConfig) -> BridgeConfig {
        BridgeConfig {
            http_bind_addr: self.http_bind.unwrap_or(base.http_bind_addr),
            ws_bind_addr: self.ws_bind.unwrap_or(base.ws_bind_addr),
            engine_bind_addr: self.engine_bind.unwrap_or(base.engine_bind_addr),
            capacity: self.capacity.unwrap_or(base.capacity),
            log_path: self.log_path.clone().unwrap_or(base.log_path),
            queue_depth: self.queue_depth.unwrap_or(base.queue_depth),
            max_subscribers: self.max_subscribers.unwrap_or(base.max_subscribers),
            retry_interval: self
                .retry_ms
                .map_or(base.retry_interval, Duration::from_millis),
        }
    }

    /// Loads the configuration file, if one was given.
    fn load_file(&self) -> anyhow::Result<FileConfig> {
        match &self.config {
            Some(path) => FileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display())),
            None => Ok(FileConfig::default()),
        }
    }

    /// Resolves the full configuration: flags over file over defaults.
    fn resolve(&self, file: &FileConfig) -> anyhow::Result<BridgeConfig> {
        let config = self.apply(file.to_bridge_config()?);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// The log filter: `--log-level`, then `RUST_LOG`, then the file's
    /// `[logging] level`.
    fn log_filter(&self, file: &FileConfig) -> anyhow::Result<EnvFilter> {
        if let Some(level) = &self.log_level {
            return EnvFilter::try_new(level)
                .with_context(|| format!("invalid --log-level {level:?}"));
        }
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&file.logging.level))
            .with_context(|| format!("invalid log level {:?}", file.logging.level))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and the optional config file is loaded.
/// 2. `tracing_subscriber` is initialised with the resolved log filter.
/// 3. The event log is recovered and the bridge assembled.
/// 4. The HTTP, WebSocket and engine feed listeners are started.
/// 5. On Ctrl+C (or if a listener fails) the accept loops are stopped,
///    subscriptions are ended, and the bridge waits until the log writer has
///    processed every accepted record.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file = cli.load_file()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter(&file)?)
        .init();

    let config = cli.resolve(&file)?;
    info!(
        "event bridge starting: http={}, ws={}, engine={}, capacity={}, log={}",
        config.http_bind_addr,
        config.ws_bind_addr,
        config.engine_bind_addr,
        config.capacity,
        config.log_path.display()
    );

    let bridge = Arc::new(
        EventBridge::open(&config)
            .with_context(|| format!("failed to open event log {}", config.log_path.display()))?,
    );

    // ── Listeners ─────────────────────────────────────────────────────────────
    //
    // Each accept loop checks `running` and exits once it is cleared.
    let running = Arc::new(AtomicBool::new(true));
    let mut servers = JoinSet::new();

    let http_state = HttpState {
        bridge: Arc::clone(&bridge),
        resources: Arc::new(EmbeddedResources::new()),
    };
    servers.spawn(run_http_server(
        config.http_bind_addr,
        http_state,
        Arc::clone(&running),
    ));
    servers.spawn(run_ws_server(
        config.ws_bind_addr,
        Arc::clone(&bridge),
        Arc::clone(&running),
    ));
    let observer: Arc<dyn ProtocolObserver> = Arc::clone(bridge.tap()) as _;
    servers.spawn(run_engine_feed(
        config.engine_bind_addr,
        observer,
        Arc::clone(&running),
    ));

    // ── Wait for Ctrl+C or a failed listener ──────────────────────────────────
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("received Ctrl+C; initiating graceful shutdown"),
                Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
            }
            Ok(())
        }
        Some(joined) = servers.join_next() => {
            let result = joined.context("listener task panicked").and_then(|r| r);
            if let Err(e) = &result {
                error!("listener stopped unexpectedly: {e:#}");
            }
            result
        }
    };

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    running.store(false, Ordering::Relaxed);
    bridge.shutdown().await;

    while let Some(joined) = servers.join_next().await {
        if let Err(e) = joined.context("listener task panicked").and_then(|r| r) {
            warn!("{e:#}");
        }
    }

    info!("event bridge stopped");
    outcome
}

// ── Tests ─────────────────────────────────────────────────────────────────────
