//! Append-only on-disk event log.
//!
//! Every record appended to the ring buffer is also written here, one JSON
//! object per line, in sequence-id order:
//!
//! ```text
//! {"sequenceId":1,"kind":"request","eventType":"HeartbeatRequest",...}
//! {"sequenceId":2,"kind":"response","eventType":"HeartbeatResponse",...}
//! ```
//!
//! # Single writer
//!
//! [`EventLog::append`] never touches the file.  It pushes the record onto an
//! unbounded queue drained by one dedicated writer thread, so:
//!
//! - the in-memory append path never waits for disk I/O, and
//! - there is exactly one writer, so record boundaries are never interleaved.
//!
//! The writer batches whatever is queued, flushes, and then publishes the
//! highest sequence id it has processed.  [`EventLog::sync`] waits on that
//! value.
//!
//! # Failures
//!
//! Write failures are logged as warnings and the affected records are lost
//! from disk only; the in-memory buffer and live subscribers are unaffected.
//! The writer drops its file handle after a failure and reopens the file when
//! the next record arrives, so a transient condition (disk full, file
//! removed) heals on its own.
//!
//! # Recovery
//!
//! [`EventLog::open`] scans the existing file before starting the writer.  It
//! returns the highest sequence id found and the most recent records so the
//! ring buffer can resume where the previous run stopped.  Torn or
//! unparsable lines (e.g. a partial write at crash time) are skipped.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Lines, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use event_bridge_core::EventRecord;

/// Error type for event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing event log at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The writer thread could not be started.
    #[error("failed to start event log writer: {0}")]
    Spawn(#[source] io::Error),
}

/// What [`EventLog::open`] found on disk.
#[derive(Debug, Default)]
pub struct Recovered {
    /// Highest sequence id in the log, or 0 for an empty or missing log.
    pub last_sequence_id: u64,
    /// The newest records, oldest first, at most `tail_capacity` of them.
    pub tail: VecDeque<Arc<EventRecord>>,
    /// Number of valid records in the log.
    pub record_count: u64,
    /// Lines that could not be parsed or were out of order.
    pub skipped_lines: u64,
}

/// Handle to the on-disk log and its writer thread.
///
/// Dropping the handle closes the queue; the writer flushes what it has and
/// exits.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    queue: mpsc::Sender<Arc<EventRecord>>,
    written: watch::Receiver<u64>,
}

impl EventLog {
    /// Recovers the existing log at `path` and starts the writer thread.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Io`] if an existing log cannot be read, and
    /// [`EventLogError::Spawn`] if the writer thread cannot be started.  A
    /// missing file is not an error; it is created on the first append.
    pub fn open(
        path: impl Into<PathBuf>,
        tail_capacity: usize,
    ) -> Result<(Self, Recovered), EventLogError> {
        let path = path.into();
        let recovered = recover(&path, tail_capacity)?;
        let torn_tail = ends_mid_line(&path).map_err(|source| EventLogError::Io {
            path: path.clone(),
            source,
        })?;

        let (queue, receiver) = mpsc::channel();
        let (written_tx, written) = watch::channel(recovered.last_sequence_id);

        let writer_path = path.clone();
        thread::Builder::new()
            .name("event-log-writer".to_string())
            .spawn(move || run_writer(&writer_path, torn_tail, receiver, written_tx))
            .map_err(EventLogError::Spawn)?;

        Ok((
            Self {
                path,
                queue,
                written,
            },
            recovered,
        ))
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queues `record` for the writer.  Never blocks.
    ///
    /// Callers must append in sequence-id order; the ring buffer does this
    /// from inside its serialized append path.
    pub fn append(&self, record: Arc<EventRecord>) {
        if self.queue.send(record).is_err() {
            // Only possible if the writer thread panicked.
            warn!("event log writer is gone; record not persisted");
        }
    }

    /// Highest sequence id the writer has processed.
    ///
    /// "Processed" includes records whose write failed; it tells callers the
    /// writer has caught up, not that every record is on disk.
    pub fn written_through(&self) -> u64 {
        *self.written.borrow()
    }

    /// Waits until the writer has processed every record up to `sequence_id`.
    ///
    /// Returns immediately if the writer thread is gone.
    pub async fn sync(&self, sequence_id: u64) {
        let mut written = self.written.clone();
        if written.wait_for(|w| *w >= sequence_id).await.is_err() {
            debug!("event log writer stopped before reaching {sequence_id}");
        }
    }

    /// Lazily reads records with `after < sequence_id < before`, in order.
    ///
    /// The file is opened here and read line by line as the returned iterator
    /// is advanced.  A missing file yields an empty range.  Both steps block;
    /// async callers use [`EventLog::reader`].
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Io`] if the file exists but cannot be opened.
    pub fn read_range(&self, after: u64, before: u64) -> Result<LogRange, EventLogError> {
        LogRange::open(&self.path, after, before)
    }

    /// Like [`EventLog::read_range`], but opens and reads the file on the
    /// blocking thread pool, [`READ_CHUNK`] records at a time.
    pub fn reader(&self, after: u64, before: u64) -> LogReader {
        LogReader {
            state: ReaderState::Unopened {
                path: self.path.clone(),
                after,
                before,
            },
            chunk: VecDeque::new(),
        }
    }
}

// ── Range reader ──────────────────────────────────────────────────────────────

/// Lazy iterator over a sequence-id range of the on-disk log.
#[derive(Debug)]
pub struct LogRange {
    lines: Option<Lines<BufReader<File>>>,
    after: u64,
    before: u64,
}

impl LogRange {
    fn open(path: &Path, after: u64, before: u64) -> Result<Self, EventLogError> {
        let lines = match File::open(path) {
            Ok(file) => Some(BufReader::new(file).lines()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(EventLogError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(Self {
            lines,
            after,
            before,
        })
    }

    /// A range that yields nothing.
    pub fn empty() -> Self {
        Self {
            lines: None,
            after: 0,
            before: 0,
        }
    }
}

impl Iterator for LogRange {
    type Item = EventRecord;

    fn next(&mut self) -> Option<EventRecord> {
        let lines = self.lines.as_mut()?;

        loop {
            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!("event log read failed: {e}");
                    self.lines = None;
                    return None;
                }
                None => {
                    self.lines = None;
                    return None;
                }
            };

            let Some(record) = parse_line(&line) else {
                continue;
            };
            if record.sequence_id <= self.after {
                continue;
            }
            if record.sequence_id >= self.before {
                // The log is ordered, so nothing further can be in range.
                self.lines = None;
                return None;
            }
            return Some(record);
        }
    }
}

/// Records a [`LogReader`] reads per trip to the blocking thread pool.
pub const READ_CHUNK: usize = 256;

/// Async reader over a sequence-id range of the on-disk log.
///
/// File access runs on `spawn_blocking`, so a long replay never occupies an
/// async worker thread.  If the file cannot be opened or read, the range ends
/// early with a warning: those records are missing from replay and nothing
/// else is affected.
#[derive(Debug)]
pub struct LogReader {
    state: ReaderState,
    chunk: VecDeque<EventRecord>,
}

#[derive(Debug)]
enum ReaderState {
    Unopened { path: PathBuf, after: u64, before: u64 },
    Open(LogRange),
    Done,
}

impl LogReader {
    /// A reader that yields nothing.
    pub fn empty() -> Self {
        Self {
            state: ReaderState::Done,
            chunk: VecDeque::new(),
        }
    }

    /// The next record in the range, or `None` once it is exhausted.
    pub async fn next_record(&mut self) -> Option<EventRecord> {
        if self.chunk.is_empty() {
            self.fill().await;
        }
        self.chunk.pop_front()
    }

    async fn fill(&mut self) {
        let state = std::mem::replace(&mut self.state, ReaderState::Done);
        if matches!(state, ReaderState::Done) {
            return;
        }

        let read = tokio::task::spawn_blocking(
            move || -> Result<(LogRange, Vec<EventRecord>), EventLogError> {
                let mut range = match state {
                    ReaderState::Unopened {
                        path,
                        after,
                        before,
                    } => LogRange::open(&path, after, before)?,
                    ReaderState::Open(range) => range,
                    ReaderState::Done => LogRange::empty(),
                };
                let chunk = range.by_ref().take(READ_CHUNK).collect();
                Ok((range, chunk))
            },
        )
        .await;

        match read {
            Ok(Ok((range, chunk))) => {
                if chunk.len() == READ_CHUNK {
                    self.state = ReaderState::Open(range);
                }
                self.chunk.extend(chunk);
            }
            Ok(Err(e)) => warn!("replaying without on-disk records: {e}"),
            Err(e) => warn!("event log reader stopped: {e}"),
        }
    }
}

// ── Recovery ──────────────────────────────────────────────────────────────────

fn recover(path: &Path, tail_capacity: usize) -> Result<Recovered, EventLogError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("no event log at {}; starting empty", path.display());
            return Ok(Recovered::default());
        }
        Err(source) => {
            return Err(EventLogError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut recovered = Recovered::default();

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| EventLogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(record) = parse_line(&line) else {
            if !line.trim().is_empty() {
                recovered.skipped_lines += 1;
            }
            continue;
        };

        if record.sequence_id <= recovered.last_sequence_id {
            recovered.skipped_lines += 1;
            continue;
        }

        recovered.last_sequence_id = record.sequence_id;
        recovered.record_count += 1;
        if tail_capacity > 0 {
            if recovered.tail.len() == tail_capacity {
                recovered.tail.pop_front();
            }
            recovered.tail.push_back(Arc::new(record));
        }
    }

    if recovered.skipped_lines > 0 {
        warn!(
            "event log {}: skipped {} unreadable line(s) during recovery",
            path.display(),
            recovered.skipped_lines
        );
    }
    info!(
        "event log {}: recovered {} record(s), last sequence id {}",
        path.display(),
        recovered.record_count,
        recovered.last_sequence_id
    );

    Ok(recovered)
}

/// Returns `true` if the file exists, is non-empty, and does not end with a
/// newline (a crash interrupted the last write).
fn ends_mid_line(path: &Path) -> io::Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

fn parse_line(line: &str) -> Option<EventRecord> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!("skipping unparsable event log line: {e}");
            None
        }
    }
}

// ── Writer thread ─────────────────────────────────────────────────────────────

/// Writer state: the open file, if any, whether the file may end in a torn
/// line, and whether we are in a failure streak (so the warning is logged
/// once, not once per record).
struct Writer<'a> {
    path: &'a Path,
    file: Option<BufWriter<File>>,
    torn_tail: bool,
    failing: bool,
}

impl Writer<'_> {
    fn write(&mut self, record: &EventRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(e) => {
                warn!("event log: cannot serialize sequence id {}: {e}", record.sequence_id);
                return;
            }
        };
        line.push(b'\n');

        // Terminate a torn line so this record starts on a line of its own.
        let torn_tail = self.torn_tail;
        let result = self.open().and_then(|file| {
            if torn_tail {
                file.write_all(b"\n")?;
            }
            file.write_all(&line)
        });
        match result {
            Ok(()) => self.torn_tail = false,
            Err(e) => self.fail(record.sequence_id, &e),
        }
    }

    fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                self.fail(0, &e);
                return;
            }
            if self.failing {
                info!("event log {} is writable again", self.path.display());
                self.failing = false;
            }
        }
    }

    fn open(&mut self) -> io::Result<&mut BufWriter<File>> {
        let file = match self.file.take() {
            Some(file) => file,
            None => BufWriter::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.path)?,
            ),
        };
        Ok(self.file.insert(file))
    }

    fn fail(&mut self, sequence_id: u64, error: &io::Error) {
        // Drop the handle; the next record reopens the file.
        self.file = None;
        self.torn_tail = true;
        if !self.failing {
            warn!(
                "event log {} write failed at sequence id {sequence_id}: {error}; \
                 records will be missing from disk until it recovers",
                self.path.display()
            );
            self.failing = true;
        }
    }
}

fn run_writer(
    path: &Path,
    torn_tail: bool,
    queue: mpsc::Receiver<Arc<EventRecord>>,
    written: watch::Sender<u64>,
) {
    let mut writer = Writer {
        path,
        file: None,
        torn_tail,
        failing: false,
    };

    // `recv` blocks until a record arrives or every sender is dropped.
    while let Ok(first) = queue.recv() {
        let mut last = first.sequence_id;
        writer.write(&first);

        // Drain whatever else is already queued before flushing.
        while let Ok(record) = queue.try_recv() {
            last = record.sequence_id;
            writer.write(&record);
        }

        writer.flush();
        written.send_replace(last);
    }

    writer.flush();
    debug!("event log writer for {} stopped", path.display());
}

// ── Tests ─────────────────────────────────────────────────────────────────────
