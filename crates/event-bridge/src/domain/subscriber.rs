//! Subscriber lifecycle types.
//!
//! ```text
//! connect ──► Connecting ──(backlog replay done)──► Streaming
//!                 │                                     │
//!                 └──────(close / write failure / shed)─┴──► Disconnected
//! ```

use serde::Serialize;
use uuid::Uuid;

/// Where a subscriber is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberState {
    /// Replaying the backlog; not yet registered for live records.
    Connecting,
    /// Registered; receives every new record as it is appended.
    Streaming,
    /// Unregistered and released.  Terminal.
    Disconnected,
}

impl SubscriberState {
    /// Returns `true` once the subscriber can no longer receive records.
    pub fn is_terminal(self) -> bool {
        self == SubscriberState::Disconnected
    }
}

/// Point-in-time view of one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSnapshot {
    pub id: Uuid,
    /// Sequence id of the last record delivered, or the replay start position
    /// requested at connect time.
    pub cursor: u64,
    pub state: SubscriberState,
}
