//! # event-bridge-core
//!
//! Shared library for the event bridge containing the event record model, the
//! catalogue of protocol message types, and the wire encoding delivered to
//! observers.
//!
//! This crate is used by the bridge service and by anything that needs to read
//! the bridge's on-disk log or wire messages.  It has zero dependencies on
//! async runtimes, sockets, or files.
//!
//! # Architecture overview
//!
//! The bridge sits between a central system's protocol engine (which exchanges
//! request/response messages with many remote field devices) and any number of
//! live observers.  Every request and every response, in both directions, is
//! captured as an [`EventRecord`] and streamed to observers in order.
//!
//! This crate defines:
//!
//! - **`domain`** – The canonical record of one observed occurrence:
//!   [`EventRecord`] (immutable, sequenced) and [`NewEvent`] (the same data
//!   before a sequence number has been assigned).
//!
//! - **`protocol`** – The names of every supported protocol message
//!   ([`MessageType`]), the record's wire shape ([`WireMessage`]), and the
//!   [`SequenceCounter`] that hands out replay cursors.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `event_bridge_core::EventRecord` instead of the full module path.
pub use domain::record::{EventKind, EventRecord, NewEvent};
pub use protocol::message_type::{Direction, MessageType, UnknownMessageType};
pub use protocol::sequence::SequenceCounter;
pub use protocol::wire::{WireMessage, WirePayload};
