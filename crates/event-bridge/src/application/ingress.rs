//! Ingress: the single thread-safe entry point for new records.
//!
//! `submit` appends to the ring buffer and, under the same lock, enqueues the
//! record on every streaming subscriber's live queue.  Enqueueing uses
//! `try_send`, so `submit` never waits on a subscriber's I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use event_bridge_core::NewEvent;

use crate::application::broadcaster::Broadcaster;
use crate::application::ring_buffer::DurableRingBuffer;
use crate::application::tap::EventSink;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    /// The bridge is shutting down and accepts no more records.
    #[error("ingress is closed")]
    Closed,
}

/// Appends records and fans them out to subscribers.
pub struct Ingress {
    buffer: Arc<DurableRingBuffer>,
    broadcaster: Arc<Broadcaster>,
    open: AtomicBool,
}

impl Ingress {
    pub fn new(buffer: Arc<DurableRingBuffer>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            buffer,
            broadcaster,
            open: AtomicBool::new(true),
        }
    }

    /// Sequences `event`, stores it, and queues it for every live subscriber.
    /// Returns the assigned sequence id.
    ///
    /// # Errors
    ///
    /// Returns [`IngressError::Closed`] after [`Ingress::close`].
    pub fn submit(&self, event: NewEvent) -> Result<u64, IngressError> {
        let broadcaster = &self.broadcaster;
        self.buffer
            .append_if(
                event,
                || self.open.load(Ordering::Acquire),
                |record| broadcaster.fan_out(record),
            )
            .ok_or(IngressError::Closed)
    }

    /// Stops accepting records.  Idempotent.
    ///
    /// Takes effect under the buffer lock, so once this returns no further
    /// record can be appended and `last_sequence_id` is final.
    pub fn close(&self) {
        let closed_at = self.buffer.exclusive(|| {
            self.open
                .swap(false, Ordering::AcqRel)
                .then(|| self.buffer.last_sequence_id())
        });
        if let Some(last) = closed_at {
            info!("ingress closed at sequence id {last}");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl EventSink for Ingress {
    fn submit(&self, event: NewEvent) -> Result<u64, IngressError> {
        Ingress::submit(self, event)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
