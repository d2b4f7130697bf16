//! TOML configuration file for the bridge.
//!
//! Every field has a serde default, so a partial file (or none at all) is
//! valid.  Command-line flags and environment variables are applied on top of
//! the loaded values in `main.rs`.
//!
//! ```toml
//! [server]
//! http_bind = "0.0.0.0:8180"
//! ws_bind = "0.0.0.0:8181"
//! engine_bind = "127.0.0.1:8182"
//!
//! [buffer]
//! capacity = 10000
//! log_path = "events.jsonl"
//!
//! [subscribers]
//! queue_depth = 1024
//! retry_ms = 3000
//! max_subscribers = 256
//!
//! [logging]
//! level = "info"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    BridgeConfig, DEFAULT_CAPACITY, DEFAULT_MAX_SUBSCRIBERS, DEFAULT_QUEUE_DEPTH,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A bind address is not a valid `host:port` socket address.
    #[error("invalid {field} address {value:?}: {source}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub buffer: BufferSection,
    #[serde(default)]
    pub subscribers: SubscribersSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listener addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_http_bind")]
    pub http_bind: String,
    #[serde(default = "default_ws_bind")]
    pub ws_bind: String,
    /// Keep this on loopback unless the engine runs on another host; the
    /// feed is unauthenticated.
    #[serde(default = "default_engine_bind")]
    pub engine_bind: String,
}

/// Ring buffer and event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferSection {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

/// Per-subscriber delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscribersSection {
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter directive: `"error"`, `"warn"`, `"info"`, `"debug"`,
    /// `"trace"`, or a full `EnvFilter` expression.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_http_bind() -> String {
    "0.0.0.0:8180".to_string()
}
fn default_ws_bind() -> String {
    "0.0.0.0:8181".to_string()
}
fn default_engine_bind() -> String {
    "127.0.0.1:8182".to_string()
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_log_path() -> PathBuf {
    PathBuf::from("events.jsonl")
}
fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}
fn default_retry_ms() -> u64 {
    3000
}
fn default_max_subscribers() -> usize {
    DEFAULT_MAX_SUBSCRIBERS
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_bind: default_http_bind(),
            ws_bind: default_ws_bind(),
            engine_bind: default_engine_bind(),
        }
    }
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            log_path: default_log_path(),
        }
    }
}

impl Default for SubscribersSection {
    fn default() -> Self {
        Self {
            queue_depth: default_queue_depth(),
            retry_ms: default_retry_ms(),
            max_subscribers: default_max_subscribers(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FileConfig {
    /// Reads and parses the TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::Io`] if the file cannot be read and
    /// [`ConfigFileError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    /// Converts the file's values into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigFileError::InvalidAddress`] if a bind address does not
    /// parse.
    pub fn to_bridge_config(&self) -> Result<BridgeConfig, ConfigFileError> {
        Ok(BridgeConfig {
            http_bind_addr: parse_addr("server.http_bind", &self.server.http_bind)?,
            ws_bind_addr: parse_addr("server.ws_bind", &self.server.ws_bind)?,
            engine_bind_addr: parse_addr("server.engine_bind", &self.server.engine_bind)?,
            capacity: self.buffer.capacity,
            log_path: self.buffer.log_path.clone(),
            queue_depth: self.subscribers.queue_depth,
            max_subscribers: self.subscribers.max_subscribers,
            retry_interval: Duration::from_millis(self.subscribers.retry_ms),
        })
    }
}

fn parse_addr(field: &'static str, value: &str) -> Result<SocketAddr, ConfigFileError> {
    value
        .parse()
        .map_err(|source| ConfigFileError::InvalidAddress {
            field,
            value: value.to_string(),
            source,
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_empty_file_yields_defaults() {
        // Arrange / Act
        let file = FileConfig::parse("").unwrap();

        // Assert
        assert_eq!(file, FileConfig::default());
        assert_eq!(file.to_bridge_config().unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = FileConfig::parse(
            r#"
            [buffer]
            capacity = 500

            [subscribers]
            retry_ms = 1500
            "#,
        )
        .unwrap();

        let config = file.to_bridge_config().unwrap();

        assert_eq!(config.capacity, 500);
        assert_eq!(config.retry_interval, Duration::from_millis(1500));
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.http_bind_addr.port(), 8180);
        assert_eq!(file.logging.level, "info");
    }

    #[test]
    fn test_invalid_bind_address_is_reported_with_field() {
        let file = FileConfig::parse(
            r#"
            [server]
            ws_bind = "not-an-address"
            "#,
        )
        .unwrap();

        let err = file.to_bridge_config().unwrap_err();

        assert!(matches!(
            err,
            ConfigFileError::InvalidAddress {
                field: "server.ws_bind",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = FileConfig::parse("[buffer\ncapacity = ");
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        // Arrange
        let path = std::env::temp_dir().join(format!("event_bridge_cfg_{}.toml", Uuid::new_v4()));
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        // Act
        let file = FileConfig::load(&path).unwrap();

        // Assert
        assert_eq!(file.logging.level, "debug");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = std::env::temp_dir().join(format!("missing_{}.toml", Uuid::new_v4()));
        assert!(matches!(
            FileConfig::load(&path),
            Err(ConfigFileError::Io { .. })
        ));
    }
}
