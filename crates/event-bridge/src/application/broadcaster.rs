//! Broadcaster: subscriber registry, backlog replay and live fan-out.
//!
//! Each subscriber gets its own delivery task and two channels:
//!
//! ```text
//!   submit ──► DurableRingBuffer::append_with ──► fan_out ──try_send──► live queue
//!                                                                          │
//!   read_from(cursor) ──────────────── replay ──────────────┐              │
//!                                                           ▼              ▼
//!                                                     delivery task (one per subscriber)
//!                                                           │
//!                                                           ▼ outbound channel
//!                                                      Subscription (Stream of WireMessage)
//!                                                           │
//!                                                      SSE / WebSocket transport
//! ```
//!
//! # Replay → live transition
//!
//! The delivery task replays `read_from(cursor)`, then asks the ring buffer to
//! register its live queue *only if* nothing newer than `cursor` exists, under
//! the same lock `append` takes.  If records arrived during replay, it replays
//! again from the new cursor.  Once registered, the queue receives every
//! record after `cursor` and nothing at or before it, so the combined stream
//! has no gaps and no duplicates.
//!
//! # Slow subscribers
//!
//! Fan-out never waits.  A subscriber whose live queue is full is shed: its
//! queue is unregistered, the task delivers what was already queued and then
//! ends the stream.  The observer reconnects with its last id and resumes
//! gap-free from the backlog.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use event_bridge_core::{EventRecord, WireMessage};

use crate::application::ring_buffer::DurableRingBuffer;
use crate::domain::{BridgeConfig, SubscriberSnapshot, SubscriberState};

/// Wire messages buffered between a delivery task and its transport.
const OUTBOUND_BUFFER: usize = 32;

/// Why a subscription could not be created or why its delivery ended.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("subscriber limit of {max} reached")]
    TooManySubscribers { max: usize },

    /// The transport dropped its end of the subscription.
    #[error("subscriber channel closed")]
    ChannelClosed,

    /// The subscriber was removed from live fan-out, either shed for falling
    /// behind or disconnected at shutdown.
    #[error("subscriber unregistered from live delivery")]
    Unregistered,
}

// ── Registry ──────────────────────────────────────────────────────────────────

struct Entry {
    cursor: Arc<AtomicU64>,
    state: watch::Receiver<SubscriberState>,
    /// Present once the subscriber is streaming and until it is shed.
    live: Option<mpsc::Sender<Arc<EventRecord>>>,
}

#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<Uuid, Entry>>,
    /// Set by `disconnect_all`; no live queue is attached afterwards.
    closed: AtomicBool,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `live` for subscriber `id`.  Returns `false` if the
    /// registry is closed or the subscriber is gone.
    fn attach(&self, id: Uuid, live: mpsc::Sender<Arc<EventRecord>>) -> bool {
        let mut entries = self.lock();
        if self.closed.load(Ordering::Relaxed) {
            return false;
        }
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.live = Some(live);
                true
            }
            None => false,
        }
    }

    fn remove(&self, id: Uuid) {
        self.lock().remove(&id);
    }
}

/// Removes a subscriber from the registry when its delivery task finishes,
/// including when the task is aborted.
struct Registration {
    id: Uuid,
    registry: Arc<Registry>,
    state: watch::Sender<SubscriberState>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.state.send_replace(SubscriberState::Disconnected);
        self.registry.remove(self.id);
    }
}

// ── Broadcaster ───────────────────────────────────────────────────────────────

/// Accepts subscribers and fans appended records out to them.
pub struct Broadcaster {
    buffer: Arc<DurableRingBuffer>,
    registry: Arc<Registry>,
    queue_depth: usize,
    max_subscribers: usize,
    retry_interval: Duration,
}

impl Broadcaster {
    pub fn new(buffer: Arc<DurableRingBuffer>, config: &BridgeConfig) -> Self {
        Self {
            buffer,
            registry: Arc::new(Registry::default()),
            queue_depth: config.queue_depth.max(1),
            max_subscribers: config.max_subscribers,
            retry_interval: config.retry_interval,
        }
    }

    /// Opens a subscription that replays every retained record after
    /// `last_seen` (all of them if `None`) and then streams new records.
    ///
    /// A `last_seen` beyond the newest record is treated as the newest
    /// record: the subscriber starts live without replay.
    ///
    /// Must be called from within a Tokio runtime; the delivery task is
    /// spawned onto it.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::TooManySubscribers`] when the subscriber
    /// limit is reached.
    pub fn subscribe(&self, last_seen: Option<u64>) -> Result<Subscription, DeliveryError> {
        let id = Uuid::new_v4();
        let cursor = self.start_cursor(id, last_seen);
        let shared_cursor = Arc::new(AtomicU64::new(cursor));
        let (state_tx, state_rx) = watch::channel(SubscriberState::Connecting);

        {
            let mut entries = self.registry.lock();
            if entries.len() >= self.max_subscribers {
                warn!(
                    "refusing subscriber: limit of {} reached",
                    self.max_subscribers
                );
                return Err(DeliveryError::TooManySubscribers {
                    max: self.max_subscribers,
                });
            }
            entries.insert(
                id,
                Entry {
                    cursor: Arc::clone(&shared_cursor),
                    state: state_rx.clone(),
                    live: None,
                },
            );
        }

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let task = DeliveryTask {
            id,
            buffer: Arc::clone(&self.buffer),
            registry: Arc::clone(&self.registry),
            out: out_tx,
            queue_depth: self.queue_depth,
            retry_interval: self.retry_interval,
        };
        let registration = Registration {
            id,
            registry: Arc::clone(&self.registry),
            state: state_tx,
        };

        info!("subscriber {id} connected, replaying after {cursor}");
        let handle = tokio::spawn(task.run(cursor, registration));

        Ok(Subscription {
            id,
            out: out_rx,
            cursor: shared_cursor,
            state: state_rx,
            task: handle,
        })
    }

    /// Hands `record` to every streaming subscriber's live queue.
    ///
    /// Called by the ingress path from inside
    /// [`DurableRingBuffer::append_with`], so records arrive in sequence-id
    /// order.  Never blocks.
    pub fn fan_out(&self, record: &Arc<EventRecord>) {
        let mut entries = self.registry.lock();
        for (id, entry) in entries.iter_mut() {
            let Some(live) = entry.live.as_ref() else {
                continue;
            };
            match live.try_send(Arc::clone(record)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        "subscriber {id} is {} records behind; shedding at sequence id {}",
                        self.queue_depth, record.sequence_id
                    );
                    entry.live = None;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    entry.live = None;
                }
            }
        }
    }

    /// Point-in-time view of every connected subscriber.
    pub fn snapshots(&self) -> Vec<SubscriberSnapshot> {
        self.registry
            .lock()
            .iter()
            .map(|(id, entry)| SubscriberSnapshot {
                id: *id,
                cursor: entry.cursor.load(Ordering::Relaxed),
                state: *entry.state.borrow(),
            })
            .collect()
    }

    /// Number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Unregisters every subscriber from live delivery.  Each delivery task
    /// flushes what it already has queued and then ends its stream.
    pub fn disconnect_all(&self) {
        let mut entries = self.registry.lock();
        self.registry.closed.store(true, Ordering::Relaxed);
        for entry in entries.values_mut() {
            entry.live = None;
        }
        info!("disconnecting {} subscriber(s)", entries.len());
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    fn start_cursor(&self, id: Uuid, last_seen: Option<u64>) -> u64 {
        let last = self.buffer.last_sequence_id();
        match last_seen {
            Some(seen) if seen > last => {
                warn!("subscriber {id} claims to have seen {seen}, newest is {last}; starting at {last}");
                last
            }
            Some(seen) => seen,
            None => 0,
        }
    }
}

// ── Delivery task ─────────────────────────────────────────────────────────────

struct DeliveryTask {
    id: Uuid,
    buffer: Arc<DurableRingBuffer>,
    registry: Arc<Registry>,
    out: mpsc::Sender<WireMessage>,
    queue_depth: usize,
    retry_interval: Duration,
}

impl DeliveryTask {
    async fn run(self, cursor: u64, registration: Registration) {
        let mut cursor = cursor;
        let result = self.deliver(&mut cursor, &registration).await;

        match result {
            Ok(()) => {}
            Err(DeliveryError::ChannelClosed) => {
                info!("subscriber {} disconnected at {cursor}", self.id);
            }
            Err(DeliveryError::Unregistered) => {
                info!("subscriber {} unregistered at {cursor}", self.id);
            }
            Err(e) => {
                warn!("subscriber {} dropped at {cursor}: {e}", self.id);
            }
        }

        // Mark the subscriber disconnected before the outbound sender (held
        // by `self`) is dropped and the stream ends.
        drop(registration);
    }

    async fn deliver(
        &self,
        cursor: &mut u64,
        registration: &Registration,
    ) -> Result<(), DeliveryError> {
        let mut live = self.replay_until_live(cursor).await?;

        registration.state.send_replace(SubscriberState::Streaming);
        info!("subscriber {} streaming after {cursor}", self.id);

        loop {
            tokio::select! {
                received = live.recv() => {
                    let Some(record) = received else {
                        return Err(DeliveryError::Unregistered);
                    };
                    self.send(&record, cursor).await?;
                }
                _ = self.out.closed() => return Err(DeliveryError::ChannelClosed),
            }
        }
    }

    /// Replays the backlog until the cursor reaches the head of the buffer,
    /// then returns the registered live queue.
    async fn replay_until_live(
        &self,
        cursor: &mut u64,
    ) -> Result<mpsc::Receiver<Arc<EventRecord>>, DeliveryError> {
        loop {
            let mut backlog = self.buffer.read_from(*cursor).await;
            while let Some(record) = backlog.next_record().await {
                self.send(&record, cursor).await?;
            }

            let (live_tx, live_rx) = mpsc::channel(self.queue_depth);
            let registered = self
                .buffer
                .when_caught_up(*cursor, || self.registry.attach(self.id, live_tx));
            match registered {
                Some(true) => return Ok(live_rx),
                Some(false) => return Err(DeliveryError::Unregistered),
                None => {}
            }
            debug!("subscriber {} fell behind during replay; replaying again", self.id);
        }
    }

    async fn send(&self, record: &EventRecord, cursor: &mut u64) -> Result<(), DeliveryError> {
        if record.sequence_id <= *cursor {
            return Ok(());
        }
        let message = WireMessage::from_record(record, self.retry_interval);
        self.out
            .send(message)
            .await
            .map_err(|_| DeliveryError::ChannelClosed)?;
        *cursor = record.sequence_id;
        Ok(())
    }
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// A subscriber's view of its delivery: a [`Stream`] of wire messages in
/// ascending id order.
///
/// The stream ends when the subscriber is shed or disconnected.  Dropping the
/// subscription cancels the delivery task and unregisters the subscriber.
pub struct Subscription {
    id: Uuid,
    out: mpsc::Receiver<WireMessage>,
    cursor: Arc<AtomicU64>,
    state: watch::Receiver<SubscriberState>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the last message taken from this subscription, or the replay
    /// start position if none has been taken yet.
    pub fn cursor(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SubscriberState {
        *self.state.borrow()
    }

    /// Waits until replay has finished and the subscriber receives live
    /// records, or until it disconnects.  Returns the state reached.
    pub async fn wait_until_streaming(&mut self) -> SubscriberState {
        match self
            .state
            .wait_for(|s| *s != SubscriberState::Connecting)
            .await
        {
            Ok(state) => *state,
            Err(_) => SubscriberState::Disconnected,
        }
    }

    /// Receives the next message, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        let message = self.out.recv().await?;
        self.cursor.store(message.id, Ordering::Relaxed);
        Some(message)
    }

    /// Receives the next message without advancing the cursor.  Callers that
    /// forward it to a peer call [`Subscription::mark_delivered`] once the
    /// write succeeds.
    pub async fn recv_pending(&mut self) -> Option<WireMessage> {
        self.out.recv().await
    }

    /// Records that message `id` reached the subscriber.
    pub fn mark_delivered(&self, id: u64) {
        self.cursor.store(id, Ordering::Relaxed);
    }
}

impl Stream for Subscription {
    type Item = WireMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<WireMessage>> {
        let this = self.get_mut();
        let polled = this.out.poll_recv(cx);
        if let Poll::Ready(Some(message)) = &polled {
            this.cursor.store(message.id, Ordering::Relaxed);
        }
        polled
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use event_bridge_core::{MessageType, NewEvent};
    use serde_json::json;
    use std::path::PathBuf;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn temp_log_path() -> PathBuf {
        std::env::temp_dir().join(format!("broadcaster_test_{}.jsonl", Uuid::new_v4()))
    }

    fn config(queue_depth: usize, max_subscribers: usize) -> BridgeConfig {
        BridgeConfig {
            queue_depth,
            max_subscribers,
            ..BridgeConfig::default()
        }
    }

    fn heartbeat(i: u64) -> NewEvent {
        NewEvent::request(
            MessageType::Heartbeat,
            Utc::now(),
            "CS001",
            format!("T{i}"),
            json!({}),
        )
    }

    fn setup(queue_depth: usize, max_subscribers: usize) -> (Arc<DurableRingBuffer>, Broadcaster, PathBuf) {
        let path = temp_log_path();
        let buffer = Arc::new(DurableRingBuffer::open(&path, 100).unwrap());
        let broadcaster = Broadcaster::new(Arc::clone(&buffer), &config(queue_depth, max_subscribers));
        (buffer, broadcaster, path)
    }

    fn submit(buffer: &DurableRingBuffer, broadcaster: &Broadcaster, i: u64) -> u64 {
        buffer.append_with(heartbeat(i), |record| broadcaster.fan_out(record))
    }

    async fn next_id(subscription: &mut Subscription) -> Option<u64> {
        timeout(WAIT, subscription.recv()).await.unwrap().map(|m| m.id)
    }

    #[tokio::test]
    async fn test_subscriber_replays_then_streams_live() {
        // Arrange
        let (buffer, broadcaster, path) = setup(16, 8);
        for i in 1..=3 {
            submit(&buffer, &broadcaster, i);
        }

        // Act
        let mut subscription = broadcaster.subscribe(None).unwrap();
        for expected in 1..=3 {
            assert_eq!(next_id(&mut subscription).await, Some(expected));
        }
        assert_eq!(subscription.wait_until_streaming().await, SubscriberState::Streaming);
        submit(&buffer, &broadcaster, 4);

        // Assert
        assert_eq!(next_id(&mut subscription).await, Some(4));
        assert_eq!(subscription.cursor(), 4);

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_last_seen_skips_already_delivered_records() {
        let (buffer, broadcaster, path) = setup(16, 8);
        for i in 1..=5 {
            submit(&buffer, &broadcaster, i);
        }

        let mut subscription = broadcaster.subscribe(Some(3)).unwrap();

        assert_eq!(next_id(&mut subscription).await, Some(4));
        assert_eq!(next_id(&mut subscription).await, Some(5));

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_last_seen_beyond_head_is_clamped() {
        // Arrange
        let (buffer, broadcaster, path) = setup(16, 8);
        submit(&buffer, &broadcaster, 1);
        submit(&buffer, &broadcaster, 2);

        // Act: the client claims id 99, which does not exist yet
        let mut subscription = broadcaster.subscribe(Some(99)).unwrap();
        subscription.wait_until_streaming().await;
        submit(&buffer, &broadcaster, 3);

        // Assert: record 3 is delivered, not skipped as "already seen"
        assert_eq!(next_id(&mut subscription).await, Some(3));

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_wire_message_carries_retry_hint() {
        let (buffer, broadcaster, path) = setup(16, 8);
        submit(&buffer, &broadcaster, 1);

        let mut subscription = broadcaster.subscribe(None).unwrap();
        let message = timeout(WAIT, subscription.recv()).await.unwrap().unwrap();

        assert_eq!(message.retry_interval(), broadcaster.retry_interval());
        assert_eq!(message.event, "HeartbeatRequest");

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_subscriber_limit_is_enforced() {
        let (buffer, broadcaster, path) = setup(16, 1);

        let _first = broadcaster.subscribe(None).unwrap();
        let second = broadcaster.subscribe(None);

        assert!(matches!(
            second,
            Err(DeliveryError::TooManySubscribers { max: 1 })
        ));

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_dropping_subscription_unregisters_it() {
        // Arrange
        let (buffer, broadcaster, path) = setup(16, 8);
        let mut subscription = broadcaster.subscribe(None).unwrap();
        subscription.wait_until_streaming().await;
        assert_eq!(broadcaster.subscriber_count(), 1);

        // Act
        drop(subscription);

        // Assert: the aborted task's registration guard removes the entry
        timeout(WAIT, async {
            while broadcaster.subscriber_count() != 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_shed_without_affecting_others() {
        // Arrange: queue depth 2; the slow subscriber never reads
        let (buffer, broadcaster, path) = setup(2, 8);
        let mut slow = broadcaster.subscribe(None).unwrap();
        let mut fast = broadcaster.subscribe(None).unwrap();
        slow.wait_until_streaming().await;
        fast.wait_until_streaming().await;

        // Act: enough records to fill the slow subscriber's queues
        let total = (OUTBOUND_BUFFER + 10) as u64;
        for i in 1..=total {
            submit(&buffer, &broadcaster, i);
            assert_eq!(next_id(&mut fast).await, Some(i));
        }

        // Assert: the slow stream ends after what it already had queued
        let mut received = Vec::new();
        while let Some(id) = next_id(&mut slow).await {
            received.push(id);
        }
        assert!(!received.is_empty());
        assert!((received.len() as u64) < total);
        assert_eq!(received, (1..=received.len() as u64).collect::<Vec<_>>());
        assert_eq!(slow.state(), SubscriberState::Disconnected);
        assert_eq!(fast.state(), SubscriberState::Streaming);

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_snapshots_report_cursor_and_state() {
        let (buffer, broadcaster, path) = setup(16, 8);
        submit(&buffer, &broadcaster, 1);
        let mut subscription = broadcaster.subscribe(None).unwrap();
        next_id(&mut subscription).await;
        subscription.wait_until_streaming().await;

        let snapshots = broadcaster.snapshots();

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, subscription.id());
        assert_eq!(snapshots[0].cursor, 1);
        assert_eq!(snapshots[0].state, SubscriberState::Streaming);

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_disconnect_all_ends_every_stream() {
        let (buffer, broadcaster, path) = setup(16, 8);
        let mut subscription = broadcaster.subscribe(None).unwrap();
        subscription.wait_until_streaming().await;

        broadcaster.disconnect_all();

        assert_eq!(next_id(&mut subscription).await, None);

        // Subscribers arriving after shutdown end without going live.
        let mut late = broadcaster.subscribe(None).unwrap();
        assert_eq!(late.wait_until_streaming().await, SubscriberState::Disconnected);

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_recv_pending_leaves_cursor_until_marked() {
        // Arrange
        let (buffer, broadcaster, path) = setup(16, 8);
        submit(&buffer, &broadcaster, 1);
        let mut subscription = broadcaster.subscribe(None).unwrap();

        // Act
        let message = timeout(WAIT, subscription.recv_pending())
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(message.id, 1);
        assert_eq!(subscription.cursor(), 0);
        subscription.mark_delivered(message.id);
        assert_eq!(subscription.cursor(), 1);

        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_stream_is_woken_by_a_live_record() {
        use tokio_test::{assert_pending, assert_ready};

        // Arrange: an idle streaming subscriber
        let (buffer, broadcaster, path) = setup(16, 8);
        let mut subscription = broadcaster.subscribe(None).unwrap();
        subscription.wait_until_streaming().await;
        let mut stream = tokio_test::task::spawn(subscription);
        assert_pending!(stream.poll_next());

        // Act
        submit(&buffer, &broadcaster, 1);
        timeout(WAIT, async {
            while !stream.is_woken() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // Assert
        let message = assert_ready!(stream.poll_next());
        assert_eq!(message.map(|m| m.id), Some(1));

        drop(stream);
        buffer.sync().await;
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_unreadable_log_still_connects_subscriber() {
        // Arrange: 5 records with 2 in memory, then the log's directory
        // becomes a regular file
        let dir = std::env::temp_dir().join(format!("broadcaster_dir_{}", Uuid::new_v4()));
        std::fs::create_dir(&dir).unwrap();
        let buffer = Arc::new(DurableRingBuffer::open(dir.join("events.jsonl"), 2).unwrap());
        let broadcaster = Broadcaster::new(Arc::clone(&buffer), &config(16, 8));
        for i in 1..=5 {
            submit(&buffer, &broadcaster, i);
        }
        buffer.sync().await;
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"").unwrap();

        // Act
        let mut subscription = broadcaster.subscribe(Some(0)).unwrap();

        // Assert: the in-memory records arrive and the subscriber goes live
        assert_eq!(next_id(&mut subscription).await, Some(4));
        assert_eq!(next_id(&mut subscription).await, Some(5));
        assert_eq!(subscription.wait_until_streaming().await, SubscriberState::Streaming);
        submit(&buffer, &broadcaster, 6);
        assert_eq!(next_id(&mut subscription).await, Some(6));

        drop(subscription);
        std::fs::remove_file(&dir).ok();
    }
}
