//! Paste storage operations backed by redb.

use super::store::{PasteStore, SaveOutcome};
use crate::{db::tables::*, error::AppError, models::paste::Paste};
use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable, ReadableTableMetadata};
use std::sync::Arc;

/// Accessor for the `pastes` redb table.
pub struct PasteDb {
    db: Arc<redb::Database>,
}

impl PasteDb {
    /// Initialize the paste table if it does not exist yet.
    ///
    /// # Returns
    /// A new [`PasteDb`] accessor bound to `db`.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(PASTES)?;
        write_txn.commit()?;
        Ok(Self { db })
    }
}

impl PasteStore for PasteDb {
    fn insert(&self, mut draft: Paste) -> Result<Paste, AppError> {
        draft.version = 0;
        draft.views = 0;
        draft.date_created = Utc::now();
        let encoded = bincode::serialize(&draft)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut pastes = write_txn.open_table(PASTES)?;
            if pastes.get(draft.id.as_str())?.is_some() {
                return Err(AppError::BadRequest(format!(
                    "Paste id '{}' already exists",
                    draft.id
                )));
            }
            pastes.insert(draft.id.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(draft)
    }

    fn get(&self, id: &str) -> Result<Option<Paste>, AppError> {
        let read_txn = self.db.begin_read()?;
        let pastes = read_txn.open_table(PASTES)?;
        match pastes.get(id)? {
            Some(value) => Ok(Some(deserialize_paste(value.value())?)),
            None => Ok(None),
        }
    }

    fn conditional_save(
        &self,
        paste: &Paste,
        expected_version: u64,
    ) -> Result<SaveOutcome, AppError> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut pastes = write_txn.open_table(PASTES)?;
            save_versioned(&mut pastes, paste, expected_version)?
        };
        if matches!(outcome, SaveOutcome::Saved(_)) {
            write_txn.commit()?;
        }
        Ok(outcome)
    }

    fn conditional_save_acking(
        &self,
        paste: &Paste,
        expected_version: u64,
        seq: u64,
    ) -> Result<SaveOutcome, AppError> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut pastes = write_txn.open_table(PASTES)?;
            save_versioned(&mut pastes, paste, expected_version)?
        };
        if matches!(outcome, SaveOutcome::Saved(_)) {
            {
                let mut queue = write_txn.open_table(TRACKING_QUEUE)?;
                let _ = queue.remove(seq)?;
            }
            write_txn.commit()?;
        }
        Ok(outcome)
    }

    fn bulk_update_where(
        &self,
        predicate: &dyn Fn(&Paste) -> bool,
        patch: &dyn Fn(&mut Paste),
    ) -> Result<usize, AppError> {
        let write_txn = self.db.begin_write()?;
        let patched = {
            let mut pastes = write_txn.open_table(PASTES)?;
            let mut matches = Vec::new();
            for item in pastes.iter()? {
                let (_, value) = item?;
                let paste = deserialize_paste(value.value())?;
                if predicate(&paste) {
                    matches.push(paste);
                }
            }

            for paste in matches.iter_mut() {
                patch(paste);
                paste.version += 1;
                let encoded = bincode::serialize(paste)?;
                pastes.insert(paste.id.as_str(), encoded.as_slice())?;
            }
            matches.len()
        };
        write_txn.commit()?;
        Ok(patched)
    }

    fn bulk_delete_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<usize, AppError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut pastes = write_txn.open_table(PASTES)?;
            let mut ids = Vec::new();
            for item in pastes.iter()? {
                let (key, value) = item?;
                let paste = deserialize_paste(value.value())?;
                if predicate(&paste) {
                    ids.push(key.value().to_string());
                }
            }

            for id in &ids {
                let _ = pastes.remove(id.as_str())?;
            }
            ids.len()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn count_all(&self) -> Result<usize, AppError> {
        let read_txn = self.db.begin_read()?;
        let pastes = read_txn.open_table(PASTES)?;
        Ok(pastes.len()? as usize)
    }

    fn scan_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<Vec<Paste>, AppError> {
        let read_txn = self.db.begin_read()?;
        let pastes = read_txn.open_table(PASTES)?;
        let mut matches = Vec::new();
        for item in pastes.iter()? {
            let (_, value) = item?;
            let paste = deserialize_paste(value.value())?;
            if predicate(&paste) {
                matches.push(paste);
            }
        }
        Ok(matches)
    }
}

/// Version-checked write of `paste` inside an open write transaction.
fn save_versioned(
    pastes: &mut redb::Table<'_, &'static str, &'static [u8]>,
    paste: &Paste,
    expected_version: u64,
) -> Result<SaveOutcome, AppError> {
    let current_version = match pastes.get(paste.id.as_str())? {
        Some(guard) => deserialize_paste(guard.value())?.version,
        None => return Ok(SaveOutcome::Missing),
    };
    if current_version != expected_version {
        return Ok(SaveOutcome::VersionConflict { current_version });
    }

    let mut next = paste.clone();
    next.version = expected_version + 1;
    let encoded = bincode::serialize(&next)?;
    pastes.insert(next.id.as_str(), encoded.as_slice())?;
    Ok(SaveOutcome::Saved(next))
}

fn deserialize_paste(bytes: &[u8]) -> Result<Paste, bincode::Error> {
    bincode::deserialize(bytes)
}
