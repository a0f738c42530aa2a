//! Shared constants used across binpaste crates.

/// Default API port for binpaste.
pub const DEFAULT_PORT: u16 = 38480;

/// Default maximum paste content size in bytes.
pub const DEFAULT_MAX_PASTE_SIZE: usize = 4096;

/// Minimum paste content length in characters.
pub const MIN_CONTENT_CHARS: usize = 5;

/// Maximum paste title length in characters.
pub const MAX_TITLE_CHARS: usize = 255;

/// Days a soft-deleted paste is retained before the purge sweep removes it.
pub const DEFAULT_RETENTION_DAYS: i64 = 180;

/// Upper bound applied to a configured retention (about a century).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Default cadence of the reaper jobs (daily).
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default idle poll interval of the tracking worker.
pub const DEFAULT_TRACKING_POLL_INTERVAL_MS: u64 = 1_000;

/// Default number of redeliveries for a tracking event before it is dropped.
pub const DEFAULT_TRACKING_MAX_REDELIVERIES: u32 = 5;

/// Window during which the creator of a public paste may still erase it.
pub const PUBLIC_ERASE_WINDOW_MINUTES: i64 = 60;

/// Search term length bounds accepted by the API layer.
pub const SEARCH_TERM_MIN_CHARS: usize = 3;
/// Upper bound for search term length.
pub const SEARCH_TERM_MAX_CHARS: usize = 25;

/// Characters of context shown on each side of a search highlight.
pub const HIGHLIGHT_RANGE: usize = 30;

/// Maximum number of entries returned by the public paste list.
pub const DEFAULT_LIST_LIMIT: usize = 100;
