//! event-bridge library crate.
//!
//! Captures every request and response a protocol engine exchanges with its
//! field devices, stores them in a durable ring buffer, and streams them to
//! any number of observers with gap-free replay from a last seen id.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! protocol engine (ProtocolObserver calls, or JSON lines over TCP)
//!         ↓
//! [event-bridge]
//!   ├── domain/           Pure types: BridgeConfig, subscriber states
//!   ├── application/      tap → ingress → ring buffer → broadcaster
//!   └── infrastructure/
//!         ├── event_log/    Append-only JSON-lines log, single writer thread
//!         ├── http_server/  SSE, record query, health (axum)
//!         ├── ws_server/    WebSocket subscriptions (tokio-tungstenite)
//!         ├── engine_feed/  Out-of-process engine notifications
//!         └── config_file/  TOML configuration
//!         ↓
//! observers (SSE / WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `event-bridge-core` and the event log.
//! - `infrastructure` depends on all other layers plus `tokio`, `axum` and
//!   `tokio-tungstenite`.
//!
//! # Embedding
//!
//! An in-process engine opens an [`application::EventBridge`] and attaches
//! [`application::EventBridge::tap`] as its [`application::ProtocolObserver`].

/// Domain layer: configuration and subscriber types (no I/O).
pub mod domain;

/// Application layer: the record pipeline.
pub mod application;

/// Infrastructure layer: event log, network endpoints, configuration file.
pub mod infrastructure;
