//! Protocol module containing the message catalogue, sequence numbering, and
//! the observer-facing wire encoding.

pub mod message_type;
pub mod sequence;
pub mod wire;

pub use message_type::{Direction, MessageType, UnknownMessageType};
pub use sequence::SequenceCounter;
pub use wire::{WireMessage, WirePayload};
