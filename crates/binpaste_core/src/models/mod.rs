//! Data models for persistence and API payloads.

/// Paste entity and view models.
pub mod paste;
/// Durable view-tracking events.
pub mod tracking;
