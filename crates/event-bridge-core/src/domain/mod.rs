//! Domain types for observed protocol occurrences.

pub mod record;

pub use record::{EventKind, EventRecord, NewEvent};
