//! Thread-safe sequence counter for event record numbering.
//!
//! # What is a sequence id?
//!
//! Every event record carries a monotonically increasing integer called its
//! *sequence id*.  Observers use it as a replay cursor:
//!
//! - **Resume after a disconnect** – an observer that last saw record 50 asks
//!   for "everything after 50" and receives 51, 52, … with nothing missing.
//! - **Detect duplicates** – a record whose id is not greater than the
//!   observer's cursor has already been delivered and is skipped.
//!
//! Sequence ids start at 1.  The value 0 is reserved as the cursor meaning
//! "nothing seen yet", so `read_from(0)` replays everything retained.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU64` internally so `last_issued()` can be read for
//! diagnostics without taking the ring buffer's lock.  Issuing new ids happens
//! inside the buffer's serialized append path, which is what makes the ids
//! gap-free in the order records are stored.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing counter for sequence ids.
///
/// # Examples
///
/// ```rust
/// use event_bridge_core::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// assert_eq!(counter.last_issued(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    /// The next id to hand out.
    next: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter whose first id is 1.
    pub fn new() -> Self {
        Self::resume_after(0)
    }

    /// Creates a counter that continues after `last`, e.g. the highest id
    /// recovered from the on-disk log after a restart.
    pub fn resume_after(last: u64) -> Self {
        Self {
            next: AtomicU64::new(last + 1),
        }
    }

    /// Returns the next sequence id and atomically advances the counter.
    ///
    /// `Ordering::Relaxed` is sufficient: the ids are only ever issued under
    /// the ring buffer's mutex, which already provides the happens-before
    /// relationship between producers.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the most recently issued id, or 0 if none has been issued.
    pub fn last_issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
