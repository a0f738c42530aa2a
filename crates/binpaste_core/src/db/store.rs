//! Storage contract consumed by the mutation, burn, reaper, and search layers.

use crate::error::AppError;
use crate::models::paste::Paste;
use chrono::{DateTime, Utc};

/// Result of a version-guarded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The row was persisted; carries the stored row with its new version.
    Saved(Paste),
    /// Another writer persisted first; carries the version currently stored.
    VersionConflict { current_version: u64 },
    /// The row no longer exists.
    Missing,
}

/// Keyed paste storage with per-row optimistic versioning.
///
/// Implementations must make `conditional_save` atomic with respect to other
/// writers of the same row: two writers presenting the same expected version
/// can never both succeed.
pub trait PasteStore: Send + Sync {
    /// Persist a new paste.
    ///
    /// The store stamps `date_created`, resets `version` and `views` to zero,
    /// and returns the stored row.
    ///
    /// # Errors
    /// Returns an error when the id already exists or storage fails.
    fn insert(&self, draft: Paste) -> Result<Paste, AppError>;

    /// Fetch a row by id, regardless of legitimacy.
    fn get(&self, id: &str) -> Result<Option<Paste>, AppError>;

    /// Persist `paste` only if the stored version still equals `expected_version`.
    ///
    /// On success the stored version becomes `expected_version + 1`.
    fn conditional_save(&self, paste: &Paste, expected_version: u64)
        -> Result<SaveOutcome, AppError>;

    /// [`conditional_save`](Self::conditional_save) that also removes tracking
    /// delivery `seq` from the tracking queue in the same atomic write.
    ///
    /// Nothing is written or acknowledged unless the outcome is
    /// [`SaveOutcome::Saved`].
    fn conditional_save_acking(
        &self,
        paste: &Paste,
        expected_version: u64,
        seq: u64,
    ) -> Result<SaveOutcome, AppError>;

    /// Apply `patch` to every row matching `predicate` in one atomic write.
    ///
    /// Every patched row has its version incremented.
    ///
    /// # Returns
    /// Number of rows patched.
    fn bulk_update_where(
        &self,
        predicate: &dyn Fn(&Paste) -> bool,
        patch: &dyn Fn(&mut Paste),
    ) -> Result<usize, AppError>;

    /// Remove every row matching `predicate` in one atomic write.
    ///
    /// # Returns
    /// Number of rows removed.
    fn bulk_delete_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<usize, AppError>;

    /// Count all physically stored rows, including expired and soft-deleted ones.
    fn count_all(&self) -> Result<usize, AppError>;

    /// Read every row matching `predicate`.
    fn scan_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<Vec<Paste>, AppError>;

    /// Fetch a row only when it is legitimate at `now`.
    fn get_legit(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Paste>, AppError> {
        Ok(self.get(id)?.filter(|paste| paste.is_legitimate(now)))
    }

    /// List public legitimate pastes, newest first.
    ///
    /// # Arguments
    /// - `now`: Reference instant for legitimacy.
    /// - `limit`: Maximum rows to return.
    fn list_legit(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Paste>, AppError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut pastes = self.scan_where(&|paste| paste.is_public() && paste.is_legitimate(now))?;
        pastes.sort_by(|a, b| b.date_created.cmp(&a.date_created));
        pastes.truncate(limit);
        Ok(pastes)
    }
}
