//! Domain layer for event-bridge.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes:
//!
//! - Configuration structures
//! - Subscriber lifecycle states
//!
//! The event record itself lives in `event-bridge-core` so other tools can
//! read the bridge's log and wire messages without pulling in this crate.

pub mod config;
pub mod subscriber;

pub use config::{BridgeConfig, ConfigError};
pub use subscriber::{SubscriberSnapshot, SubscriberState};
