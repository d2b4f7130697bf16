//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is assembled once at startup from CLI arguments, environment variables,
//! and an optional TOML file (see `infrastructure::config_file`), or from the
//! defaults below for local development and tests.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) makes the bridge easy to embed in tests.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default number of records held in memory for fast replay.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default depth of each live subscriber's delivery queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Default maximum number of concurrently connected subscribers.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 256;

/// Default reconnect hint sent with every delivered record.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(3000);

/// A configuration value that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

/// All runtime configuration for the event bridge.
///
/// Build this struct once at startup and share it behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use event_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.capacity, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Address the HTTP server (SSE subscriptions, record query, health)
    /// binds to.
    pub http_bind_addr: SocketAddr,

    /// Address the WebSocket subscription endpoint binds to.
    pub ws_bind_addr: SocketAddr,

    /// Address on which an out-of-process protocol engine streams its
    /// lifecycle notifications.  Defaults to loopback only because the feed
    /// is unauthenticated.
    pub engine_bind_addr: SocketAddr,

    /// Number of most-recent records kept in memory.
    pub capacity: usize,

    /// Path of the append-only on-disk event log.
    pub log_path: PathBuf,

    /// Records a live subscriber may have queued before it is shed.
    pub queue_depth: usize,

    /// Connections beyond this are refused.
    pub max_subscribers: usize,

    /// Reconnect hint attached to every delivered record.
    pub retry_interval: Duration,
}

impl BridgeConfig {
    /// Rejects settings that would make the bridge unusable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Zero`] if a capacity-like setting is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Zero { field: "capacity" });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Zero {
                field: "queue_depth",
            });
        }
        if self.max_subscribers == 0 {
            return Err(ConfigError::Zero {
                field: "max_subscribers",
            });
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    /// | Field            | Default           |
    /// |------------------|-------------------|
    /// | http_bind_addr   | `0.0.0.0:8180`    |
    /// | ws_bind_addr     | `0.0.0.0:8181`    |
    /// | engine_bind_addr | `127.0.0.1:8182`  |
    /// | capacity         | 10 000            |
    /// | log_path         | `events.jsonl`    |
    /// | queue_depth      | 1024              |
    /// | max_subscribers  | 256               |
    /// | retry_interval   | 3 seconds         |
    fn default() -> Self {
        Self {
            http_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8180)),
            ws_bind_addr: SocketAddr::from(([0, 0, 0, 0], 8181)),
            engine_bind_addr: SocketAddr::from(([127, 0, 0, 1], 8182)),
            capacity: DEFAULT_CAPACITY,
            log_path: PathBuf::from("events.jsonl"),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
