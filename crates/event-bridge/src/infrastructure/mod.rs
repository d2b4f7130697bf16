//! Infrastructure layer for event-bridge.
//!
//! The infrastructure layer handles all I/O: the on-disk event log, the
//! configuration file, and every network endpoint.
//!
//! # Responsibilities
//!
//! - Appending records to, recovering, and range-reading the event log
//! - Loading the TOML configuration file
//! - Serving SSE, the record query and health over HTTP
//! - Serving WebSocket subscriptions
//! - Accepting lifecycle notifications from an out-of-process engine
//! - Handling the graceful shutdown signal in every accept loop
//!
//! # What does NOT belong here?
//!
//! - Sequence assignment, replay or fan-out (that is the application layer)
//! - Record and wire types (that is `event-bridge-core`)

pub mod config_file;
pub mod engine_feed;
pub mod event_log;
pub mod http_server;
pub mod resources;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use engine_feed::run_engine_feed;
pub use http_server::run_http_server;
pub use ws_server::run_ws_server;
