//! EventBridge: wires the ring buffer, broadcaster, ingress and tap together.
//!
//! ```text
//!  protocol engine ──► EventTap ──► Ingress::submit ──► DurableRingBuffer ──► event log
//!                                                 │
//!                                                 └──► Broadcaster ──► subscribers
//! ```
//!
//! Every collaborator is owned here and shared behind an `Arc`; there is no
//! global state.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use event_bridge_core::MessageType;

use crate::application::broadcaster::{Broadcaster, DeliveryError, Subscription};
use crate::application::ingress::Ingress;
use crate::application::ring_buffer::DurableRingBuffer;
use crate::application::tap::EventTap;
use crate::domain::BridgeConfig;
use crate::infrastructure::event_log::EventLogError;

/// Buffer and delivery statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeHealth {
    pub last_sequence_id: u64,
    pub oldest_in_memory: Option<u64>,
    pub retained: usize,
    pub capacity: usize,
    pub subscribers: usize,
    pub persisted_through: u64,
    pub accepting: bool,
}

/// The assembled bridge.
pub struct EventBridge {
    buffer: Arc<DurableRingBuffer>,
    broadcaster: Arc<Broadcaster>,
    ingress: Arc<Ingress>,
    tap: Arc<EventTap<Arc<Ingress>>>,
}

impl EventBridge {
    /// Opens (or recovers) the event log and builds every component.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError`] if the log cannot be recovered.
    pub fn open(config: &BridgeConfig) -> Result<Self, EventLogError> {
        let buffer = Arc::new(DurableRingBuffer::open(&config.log_path, config.capacity)?);
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&buffer), config));
        let ingress = Arc::new(Ingress::new(Arc::clone(&buffer), Arc::clone(&broadcaster)));
        let tap = Arc::new(EventTap::new(Arc::clone(&ingress)));

        info!(
            "event bridge open: log {}, {} message types tapped in both phases",
            config.log_path.display(),
            MessageType::ALL.len()
        );

        Ok(Self {
            buffer,
            broadcaster,
            ingress,
            tap,
        })
    }

    /// See [`Broadcaster::subscribe`].
    pub fn subscribe(&self, last_seen: Option<u64>) -> Result<Subscription, DeliveryError> {
        self.broadcaster.subscribe(last_seen)
    }

    pub fn buffer(&self) -> &Arc<DurableRingBuffer> {
        &self.buffer
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn ingress(&self) -> &Arc<Ingress> {
        &self.ingress
    }

    /// The observer to attach to the protocol engine.
    pub fn tap(&self) -> &Arc<EventTap<Arc<Ingress>>> {
        &self.tap
    }

    pub fn health(&self) -> BridgeHealth {
        BridgeHealth {
            last_sequence_id: self.buffer.last_sequence_id(),
            oldest_in_memory: self.buffer.oldest_in_memory(),
            retained: self.buffer.len(),
            capacity: self.buffer.capacity(),
            subscribers: self.broadcaster.subscriber_count(),
            persisted_through: self.buffer.persisted_through(),
            accepting: self.ingress.is_open(),
        }
    }

    /// Stops ingress, ends every subscription, and waits until the log
    /// writer has processed every accepted record.
    pub async fn shutdown(&self) {
        self.ingress.close();
        self.broadcaster.disconnect_all();
        self.buffer.sync().await;
        info!(
            "event bridge stopped; persisted through sequence id {}",
            self.buffer.persisted_through()
        );
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
