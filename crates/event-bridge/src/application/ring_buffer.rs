//! DurableRingBuffer: the bridge's single owned store of event records.
//!
//! The most recent `capacity` records live in memory for fast replay.  Every
//! record is also handed to the on-disk [`EventLog`], so replay windows wider
//! than `capacity`, and restarts, are served from disk.
//!
//! # Serialized mutation
//!
//! Sequence assignment, the in-memory append, eviction and the hand-off to the
//! log writer all happen under one mutex.  That gives:
//!
//! - gap-free, strictly increasing sequence ids across concurrent producers,
//! - records reaching the log writer in sequence-id order, and
//! - a single point where "everything up to id N is visible" is true, which
//!   the broadcaster uses to switch a subscriber from replay to live delivery
//!   without dropping or duplicating a record.
//!
//! The lock is held only for in-memory work; disk I/O happens on the log's
//! writer thread.
//!
//! ```text
//!            append ──► [ 7 | 8 | 9 | 10 ]  (memory, capacity 4)
//!                          │
//!                          ▼
//!          events.jsonl  1 2 3 4 5 6 7 8 9 10   (disk, everything)
//!
//! read_from(2) = disk(2 < id < 7) ++ memory(7..=10)
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use event_bridge_core::{EventRecord, NewEvent, SequenceCounter};

use crate::infrastructure::event_log::{EventLog, EventLogError, LogReader};

/// Bounded in-memory window over an append-only on-disk log.
#[derive(Debug)]
pub struct DurableRingBuffer {
    records: Mutex<VecDeque<Arc<EventRecord>>>,
    sequence: SequenceCounter,
    capacity: usize,
    log: EventLog,
}

impl DurableRingBuffer {
    /// Opens the log at `log_path`, recovering its newest `capacity` records
    /// into memory and resuming the sequence after the highest persisted id.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] if an existing log cannot be read or the
    /// writer thread cannot be started.
    pub fn open(log_path: impl Into<PathBuf>, capacity: usize) -> Result<Self, EventLogError> {
        let capacity = capacity.max(1);
        let (log, recovered) = EventLog::open(log_path, capacity)?;

        info!(
            "ring buffer ready: capacity {capacity}, {} record(s) in memory, next sequence id {}",
            recovered.tail.len(),
            recovered.last_sequence_id + 1
        );

        Ok(Self {
            records: Mutex::new(recovered.tail),
            sequence: SequenceCounter::resume_after(recovered.last_sequence_id),
            capacity,
            log,
        })
    }

    /// Appends `event` and returns its sequence id.
    pub fn append(&self, event: NewEvent) -> u64 {
        self.append_with(event, |_| {})
    }

    /// Appends `event`, then calls `on_appended` with the new record while
    /// still holding the buffer lock.
    ///
    /// Callbacks therefore observe records in sequence-id order.  They must
    /// not block: enqueueing onto a bounded channel with `try_send` is fine,
    /// awaiting a subscriber is not.
    pub fn append_with<F>(&self, event: NewEvent, on_appended: F) -> u64
    where
        F: FnOnce(&Arc<EventRecord>),
    {
        let mut records = self.lock();
        self.push(&mut records, event, on_appended)
    }

    /// Like [`DurableRingBuffer::append_with`], but appends only if `admit`,
    /// evaluated under the buffer lock, returns true.  Returns `None` when
    /// the event was refused.
    pub fn append_if<A, F>(&self, event: NewEvent, admit: A, on_appended: F) -> Option<u64>
    where
        A: FnOnce() -> bool,
        F: FnOnce(&Arc<EventRecord>),
    {
        let mut records = self.lock();
        if !admit() {
            return None;
        }
        Some(self.push(&mut records, event, on_appended))
    }

    /// Runs `f` under the buffer lock, so no append is in progress while it
    /// runs.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _records = self.lock();
        f()
    }

    fn push<F>(
        &self,
        records: &mut VecDeque<Arc<EventRecord>>,
        event: NewEvent,
        on_appended: F,
    ) -> u64
    where
        F: FnOnce(&Arc<EventRecord>),
    {
        let sequence_id = self.sequence.next();
        let record = Arc::new(event.into_record(sequence_id));

        if records.len() == self.capacity {
            if let Some(evicted) = records.pop_front() {
                debug!("evicted sequence id {} from memory", evicted.sequence_id);
            }
        }
        records.push_back(Arc::clone(&record));

        self.log.append(Arc::clone(&record));
        on_appended(&record);

        sequence_id
    }

    /// Returns every retained record with a sequence id greater than `cursor`,
    /// in ascending order.
    ///
    /// Records still in memory come from a snapshot taken here; older ones
    /// are read lazily from the on-disk log, after waiting for the log writer
    /// to catch up with them.  Each call starts afresh from `cursor`.
    ///
    /// Records appended after this call returns are not included.  If the
    /// log cannot be read, the disk portion is skipped with a warning and
    /// only the in-memory records are returned.
    pub async fn read_from(&self, cursor: u64) -> Backlog {
        let (memory, oldest_in_memory) = {
            let records = self.lock();
            let oldest = records
                .front()
                .map_or(self.sequence.last_issued().saturating_add(1), |r| {
                    r.sequence_id
                });
            let memory: Vec<_> = records
                .iter()
                .filter(|r| r.sequence_id > cursor)
                .cloned()
                .collect();
            (memory, oldest)
        };

        let disk = if cursor < oldest_in_memory.saturating_sub(1) {
            // Evicted records may still be queued for the writer.
            self.log.sync(oldest_in_memory - 1).await;
            self.log.reader(cursor, oldest_in_memory)
        } else {
            LogReader::empty()
        };

        Backlog {
            disk,
            memory: memory.into_iter(),
        }
    }

    /// Runs `register` under the buffer lock if no record newer than `cursor`
    /// exists, and returns its result.  Returns `None` otherwise.
    ///
    /// While the lock is held no record can be appended, so whatever
    /// `register` installs sees every record after `cursor` and nothing
    /// before.
    pub fn when_caught_up<R, F>(&self, cursor: u64, register: F) -> Option<R>
    where
        F: FnOnce() -> R,
    {
        let _records = self.lock();
        (cursor >= self.sequence.last_issued()).then(register)
    }

    /// Highest sequence id issued so far, or 0.
    pub fn last_sequence_id(&self) -> u64 {
        self.sequence.last_issued()
    }

    /// Sequence id of the oldest record held in memory, if any.
    pub fn oldest_in_memory(&self) -> Option<u64> {
        self.lock().front().map(|r| r.sequence_id)
    }

    /// Number of records held in memory.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest sequence id the log writer has processed.
    pub fn persisted_through(&self) -> u64 {
        self.log.written_through()
    }

    /// Waits until the log writer has processed every record appended so
    /// far.
    pub async fn sync(&self) {
        self.log.sync(self.last_sequence_id()).await;
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<EventRecord>>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Records returned by [`DurableRingBuffer::read_from`]: the on-disk portion
/// first, then the in-memory snapshot.
#[derive(Debug)]
pub struct Backlog {
    disk: LogReader,
    memory: std::vec::IntoIter<Arc<EventRecord>>,
}

impl Backlog {
    /// The next record, or `None` once the backlog is exhausted.
    pub async fn next_record(&mut self) -> Option<Arc<EventRecord>> {
        match self.disk.next_record().await {
            Some(record) => Some(Arc::new(record)),
            None => self.memory.next(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
