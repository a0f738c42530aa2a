//! View-tracking event carried by the durable tracking queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed read of a public paste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub paste_id: String,
    /// Instant the read was served, not the instant the event is applied.
    pub viewed_at: DateTime<Utc>,
    /// Number of times this event has been handed to a consumer.
    pub deliveries: u32,
}

impl TrackingEvent {
    pub fn new(paste_id: impl Into<String>, viewed_at: DateTime<Utc>) -> Self {
        Self {
            paste_id: paste_id.into(),
            viewed_at,
            deliveries: 0,
        }
    }
}

/// A pending event as handed out by the tracking queue.
///
/// The event stays queued under `seq` until it is acknowledged, either by the
/// write that applies it or by an explicit drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingDelivery {
    pub seq: u64,
    pub event: TrackingEvent,
}
