//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Canonical paste rows (`Paste`, bincode-encoded).
pub const PASTES: TableDefinition<&str, &[u8]> = TableDefinition::new("pastes");

/// Pending tracking events keyed by publish sequence (`TrackingEvent`, bincode-encoded).
pub const TRACKING_QUEUE: TableDefinition<u64, &[u8]> = TableDefinition::new("tracking_queue");

/// Tracking queue bookkeeping (next sequence number).
pub const TRACKING_STATE: TableDefinition<&str, u64> = TableDefinition::new("tracking_state");

/// Key in [`TRACKING_STATE`] holding the next sequence to assign.
pub const TRACKING_NEXT_SEQ_KEY: &str = "next_seq";
