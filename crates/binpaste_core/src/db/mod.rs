//! Database layer for binpaste.

/// Paste storage backed by redb.
pub mod paste;
/// Durable tracking queue backed by redb.
pub mod queue;
/// Storage contract shared by the lifecycle layers.
pub mod store;
/// redb table definitions.
pub mod tables;

pub use paste::PasteDb;
pub use queue::TrackingQueueDb;
pub use store::{PasteStore, SaveOutcome};

use crate::error::AppError;
use std::path::Path;
use std::sync::Arc;
use tables::REDB_FILE_NAME;

/// Database handle with access to paste storage and the tracking queue.
///
/// redb allows a single open handle per file; clone this handle rather than
/// reopening the path.
#[derive(Clone)]
pub struct Database {
    pub db: Arc<redb::Database>,
    pub pastes: Arc<PasteDb>,
    pub tracking: Arc<TrackingQueueDb>,
}

impl Database {
    /// Build a database handle from an already opened redb instance.
    ///
    /// # Errors
    /// Returns an error if table initialization fails.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, AppError> {
        Ok(Self {
            pastes: Arc::new(PasteDb::new(db.clone())?),
            tracking: Arc::new(TrackingQueueDb::new(db.clone())?),
            db,
        })
    }

    /// Open the database directory and initialize tables.
    ///
    /// # Arguments
    /// - `path`: Directory holding the redb file; created when missing.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, the file is held
    /// by another process, or tables cannot be opened.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = Path::new(path);
        std::fs::create_dir_all(dir).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to create database directory '{}': {}",
                dir.display(),
                err
            ))
        })?;

        let file = dir.join(REDB_FILE_NAME);
        let db = match redb::Database::create(&file) {
            Ok(db) => Arc::new(db),
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database '{}' is already open by another binpaste process.\n\
                    Stop it first, or set DB_PATH to use a different database location.",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(path = %file.display(), "Opened paste database");
        Self::from_shared(db)
    }
}

#[cfg(test)]
mod tests;
