//! Integration tests for replay and live delivery.
//!
//! # Purpose
//!
//! These tests drive the bridge through its *public* API exactly as an
//! embedding protocol engine and a transport would: records go in through the
//! tap or `Ingress::submit`, and come out of `EventBridge::subscribe`.  They
//! verify the ordering guarantees observers rely on:
//!
//! - Replay from cursor 0 returns every record, in order, exactly once.
//! - Every streaming subscriber sees every new record exactly once.
//! - Eviction keeps `capacity` records in memory and everything on disk.
//! - The replay → live transition neither drops nor duplicates a record, even
//!   while producers keep submitting.
//! - A reconnecting subscriber resumes right after its last seen id.
//! - A restarted bridge recovers its history and continues the sequence.
//!
//! ```text
//! submit ──► [ring buffer + log] ──► subscribe(last_seen) ──► 1, 2, 3, ...
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use serde_json::{json, Value};
use tokio::time::timeout;
use uuid::Uuid;

use event_bridge::application::{DeviceContext, EventBridge, ProtocolObserver, Subscription};
use event_bridge::domain::{BridgeConfig, SubscriberState};
use event_bridge_core::{MessageType, NewEvent, WireMessage};

const WAIT: Duration = Duration::from_secs(10);

// ── Helpers ───────────────────────────────────────────────────────────────────

fn config(capacity: usize) -> BridgeConfig {
    BridgeConfig {
        capacity,
        log_path: std::env::temp_dir().join(format!("replay_it_{}.jsonl", Uuid::new_v4())),
        ..BridgeConfig::default()
    }
}

fn heartbeat(n: u64) -> NewEvent {
    NewEvent::request(
        MessageType::Heartbeat,
        Utc::now(),
        "CS001",
        format!("T{n}"),
        json!({}),
    )
}

fn submit_n(bridge: &EventBridge, n: u64) {
    for i in 1..=n {
        bridge.ingress().submit(heartbeat(i)).unwrap();
    }
}

async fn next(subscription: &mut Subscription) -> WireMessage {
    timeout(WAIT, subscription.recv())
        .await
        .expect("timed out waiting for a record")
        .expect("subscription ended early")
}

async fn take_ids(subscription: &mut Subscription, count: usize) -> Vec<u64> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(next(subscription).await.id);
    }
    ids
}

struct Charger;

impl DeviceContext for Charger {
    fn device_id(&self) -> &str {
        "CS001"
    }

    fn describe(&self) -> Value {
        json!({ "deviceId": "CS001" })
    }
}

// ── Replay ────────────────────────────────────────────────────────────────────

/// A subscriber connecting after N submits and replaying from 0 receives
/// exactly those N records in submission order.
#[tokio::test]
async fn test_replay_from_zero_returns_every_record_in_order() {
    // Arrange
    let config = config(100);
    let bridge = EventBridge::open(&config).unwrap();
    submit_n(&bridge, 25);

    // Act
    let mut subscription = bridge.subscribe(Some(0)).unwrap();
    let messages: Vec<WireMessage> = {
        let mut messages = Vec::new();
        for _ in 0..25 {
            messages.push(next(&mut subscription).await);
        }
        messages
    };

    // Assert
    let ids: Vec<u64> = messages.iter().map(|m| m.id).collect();
    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message.data.event_tracking_id, format!("T{}", i + 1));
    }

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

/// Replay reaches past the in-memory window into the on-disk log.
#[tokio::test]
async fn test_replay_beyond_capacity_reads_from_disk() {
    let config = config(10);
    let bridge = EventBridge::open(&config).unwrap();
    submit_n(&bridge, 100);

    let mut subscription = bridge.subscribe(None).unwrap();
    let ids = take_ids(&mut subscription, 100).await;

    assert_eq!(ids, (1..=100).collect::<Vec<_>>());
    assert_eq!(bridge.buffer().len(), 10);

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Eviction ──────────────────────────────────────────────────────────────────

/// capacity + 1 submits leave capacity records in memory, the oldest
/// evicted, and all capacity + 1 on disk.
#[tokio::test]
async fn test_eviction_at_capacity_plus_one() {
    // Arrange
    let config = config(5);
    let bridge = EventBridge::open(&config).unwrap();

    // Act
    submit_n(&bridge, 6);
    bridge.buffer().sync().await;

    // Assert
    assert_eq!(bridge.buffer().len(), 5);
    assert_eq!(bridge.buffer().oldest_in_memory(), Some(2));
    let on_disk: Vec<u64> = bridge
        .buffer()
        .event_log()
        .read_range(0, u64::MAX)
        .unwrap()
        .map(|r| r.sequence_id)
        .collect();
    assert_eq!(on_disk, (1..=6).collect::<Vec<_>>());

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Live delivery ─────────────────────────────────────────────────────────────

/// Every streaming subscriber receives every record exactly once, in order,
/// even when records are submitted from several threads at once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_live_records_reach_every_streaming_subscriber_once() {
    // Arrange: three subscribers, all streaming
    let config = config(1000);
    let bridge = Arc::new(EventBridge::open(&config).unwrap());
    let mut subscriptions = Vec::new();
    for _ in 0..3 {
        let mut subscription = bridge.subscribe(None).unwrap();
        assert_eq!(
            subscription.wait_until_streaming().await,
            SubscriberState::Streaming
        );
        subscriptions.push(subscription);
    }

    // Act: 4 producer threads x 50 records
    let producers: Vec<_> = (0..4)
        .map(|t| {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || {
                for i in 0..50 {
                    bridge.ingress().submit(heartbeat(t * 1000 + i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    // Assert
    for subscription in &mut subscriptions {
        let ids = take_ids(subscription, 200).await;
        assert_eq!(ids, (1..=200).collect::<Vec<_>>());
    }

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

/// Replay followed by live delivery has no gap and no duplicate while a
/// producer keeps submitting during the transition.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replay_to_live_transition_has_no_gap_or_duplicate() {
    // Arrange: a small window so part of the replay comes from disk
    let config = BridgeConfig {
        queue_depth: 4096,
        ..config(50)
    };
    let bridge = Arc::new(EventBridge::open(&config).unwrap());
    submit_n(&bridge, 200);

    let producer = {
        let bridge = Arc::clone(&bridge);
        std::thread::spawn(move || {
            for i in 201..=1000 {
                bridge.ingress().submit(heartbeat(i)).unwrap();
                if i % 100 == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        })
    };

    // Act: subscribe while the producer is running
    let mut subscription = bridge.subscribe(None).unwrap();
    let ids = take_ids(&mut subscription, 1000).await;
    producer.join().unwrap();

    // Assert
    assert_eq!(ids, (1..=1000).collect::<Vec<_>>());

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Tap scenario ──────────────────────────────────────────────────────────────

/// A Heartbeat request/response pair observed by the tap replays as exactly
/// two records, in order, with matching tracking ids.
#[tokio::test]
async fn test_heartbeat_request_and_response_replay_in_order() {
    // Arrange
    let config = config(100);
    let bridge = EventBridge::open(&config).unwrap();
    let sent_at = Utc::now();
    let answered_at = sent_at + TimeDelta::milliseconds(12);

    // Act
    bridge
        .tap()
        .on_request(MessageType::Heartbeat, sent_at, &Charger, &json!({}), "T1");
    bridge.tap().on_response(
        MessageType::Heartbeat,
        answered_at,
        &Charger,
        &json!({}),
        &json!({"currentTime": answered_at.to_rfc3339()}),
        "T1",
        Duration::from_millis(12),
    );
    let mut subscription = bridge.subscribe(Some(0)).unwrap();
    let request = next(&mut subscription).await;
    let response = next(&mut subscription).await;

    // Assert
    assert_eq!(request.event, "HeartbeatRequest");
    assert_eq!(request.data.device_id, "CS001");
    assert_eq!(request.data.event_tracking_id, "T1");
    assert_eq!(request.data.response, None);
    assert_eq!(request.data.runtime, None);

    assert_eq!(response.event, "HeartbeatResponse");
    assert_eq!(response.data.event_tracking_id, request.data.event_tracking_id);
    assert_eq!(response.data.runtime, Some(12));
    let elapsed = response.data.timestamp - request.data.timestamp;
    assert_eq!(response.data.runtime, Some(elapsed.num_milliseconds() as u64));
    assert!(response.data.response.is_some());

    assert_eq!(bridge.health().last_sequence_id, 2);

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Reconnection ──────────────────────────────────────────────────────────────

/// A subscriber that drops after id 50 of 100 and reconnects with 50 gets
/// 51..=100 and then live records, with nothing from 1..=50 repeated.
#[tokio::test]
async fn test_reconnect_resumes_after_last_seen() {
    // Arrange
    let config = config(1000);
    let bridge = EventBridge::open(&config).unwrap();
    submit_n(&bridge, 100);

    let mut first = bridge.subscribe(None).unwrap();
    assert_eq!(take_ids(&mut first, 50).await, (1..=50).collect::<Vec<_>>());
    let last_seen = first.cursor();
    drop(first);

    // Act
    let mut second = bridge.subscribe(Some(last_seen)).unwrap();
    let replayed = take_ids(&mut second, 50).await;
    second.wait_until_streaming().await;
    bridge.ingress().submit(heartbeat(101)).unwrap();
    let live = next(&mut second).await;

    // Assert
    assert_eq!(last_seen, 50);
    assert_eq!(replayed, (51..=100).collect::<Vec<_>>());
    assert_eq!(live.id, 101);

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Restart ───────────────────────────────────────────────────────────────────

/// A reopened bridge serves the previous run's records and continues the
/// sequence after them.
#[tokio::test]
async fn test_restart_recovers_history_and_sequence() {
    // Arrange: first run
    let config = config(10);
    {
        let bridge = EventBridge::open(&config).unwrap();
        submit_n(&bridge, 20);
        bridge.shutdown().await;
    }

    // Act: second run on the same log
    let bridge = EventBridge::open(&config).unwrap();
    let next_id = bridge.ingress().submit(heartbeat(21)).unwrap();
    let mut subscription = bridge.subscribe(None).unwrap();
    let ids = take_ids(&mut subscription, 21).await;

    // Assert
    assert_eq!(next_id, 21);
    assert_eq!(ids, (1..=21).collect::<Vec<_>>());
    assert_eq!(bridge.buffer().len(), 10);

    bridge.shutdown().await;
    std::fs::remove_file(&config.log_path).ok();
}

// ── Persistence failure ───────────────────────────────────────────────────────

/// An unwritable log loses records from disk only; live subscribers still
/// receive them.
#[tokio::test]
async fn test_unwritable_log_does_not_block_live_delivery() {
    // Arrange: the log's directory does not exist
    let config = BridgeConfig {
        log_path: std::env::temp_dir()
            .join(format!("missing_{}", Uuid::new_v4()))
            .join("events.jsonl"),
        ..BridgeConfig::default()
    };
    let bridge = EventBridge::open(&config).unwrap();
    let mut subscription = bridge.subscribe(None).unwrap();
    subscription.wait_until_streaming().await;

    // Act
    submit_n(&bridge, 3);

    // Assert
    assert_eq!(take_ids(&mut subscription, 3).await, vec![1, 2, 3]);
    bridge.shutdown().await;
    assert_eq!(bridge.health().persisted_through, 3);
}
