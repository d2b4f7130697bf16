//! Application layer for event-bridge.
//!
//! The application layer owns the record pipeline: it knows *what* happens to
//! a record between the protocol engine and a subscriber, but delegates disk
//! and network I/O to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Shaping engine notifications into records (`tap`)
//! - Serializing sequence assignment and fan-out (`ingress`)
//! - Holding the bounded in-memory window over the event log (`ring_buffer`)
//! - Replaying backlog and streaming live records per subscriber (`broadcaster`)
//!
//! # What does NOT belong here?
//!
//! - Accepting sockets or speaking HTTP/WebSocket (that is infrastructure)
//! - File formats of the event log (that is `infrastructure::event_log`)

pub mod bridge;
pub mod broadcaster;
pub mod ingress;
pub mod ring_buffer;
pub mod tap;

pub use bridge::{BridgeHealth, EventBridge};
pub use broadcaster::{Broadcaster, DeliveryError, Subscription};
pub use ingress::{Ingress, IngressError};
pub use ring_buffer::{Backlog, DurableRingBuffer};
pub use tap::{DeviceContext, EventSink, EventTap, ProtocolObserver, TapError};
