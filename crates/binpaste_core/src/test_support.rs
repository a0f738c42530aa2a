//! Shared test-only helpers for binpaste_core.

use crate::db::store::{PasteStore, SaveOutcome};
use crate::error::AppError;
use crate::models::paste::Paste;
use crate::mutation::RetryPolicy;
use crate::Database;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
///
/// # Panics
/// Panics if temp-dir creation, path conversion, or database initialization
/// fails in the test environment.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("db");
    (db, temp_dir)
}

/// Retry policy with millisecond backoff and no jitter.
pub(crate) fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        multiplier: 1.5,
        max_backoff: Duration::from_millis(5),
        jitter: false,
    }
}

/// Polls `check` until it holds or `timeout` elapses.
///
/// # Returns
/// `true` when `check` returned `true` before the deadline.
pub(crate) fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Store wrapper that injects a fixed number of failures before delegating.
pub(crate) struct ScriptedStore {
    inner: Arc<dyn PasteStore>,
    failing_gets: AtomicU32,
    failing_saves: AtomicU32,
    conflicting_saves: AtomicU32,
    failing_bulk: AtomicU32,
    stale_rows: Mutex<Vec<Paste>>,
    pub(crate) saves: AtomicU32,
}

impl ScriptedStore {
    pub(crate) fn new(inner: Arc<dyn PasteStore>) -> Self {
        Self {
            inner,
            failing_gets: AtomicU32::new(0),
            failing_saves: AtomicU32::new(0),
            conflicting_saves: AtomicU32::new(0),
            failing_bulk: AtomicU32::new(0),
            stale_rows: Mutex::new(Vec::new()),
            saves: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing_gets(self, count: u32) -> Self {
        self.failing_gets.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_saves(self, count: u32) -> Self {
        self.failing_saves.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn conflicting_saves(self, count: u32) -> Self {
        self.conflicting_saves.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_bulk(self, count: u32) -> Self {
        self.failing_bulk.store(count, Ordering::SeqCst);
        self
    }

    /// Answer the next `get` with `row` instead of the stored one, as if the
    /// read happened before a competing write landed.
    pub(crate) fn serving_stale(self, row: Paste) -> Self {
        self.stale_rows.lock().expect("stale rows lock").push(row);
        self
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn scripted_save(
        &self,
        expected_version: u64,
        save: impl FnOnce() -> Result<SaveOutcome, AppError>,
    ) -> Result<SaveOutcome, AppError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.failing_saves) {
            return Err(Self::unreachable());
        }
        if Self::take(&self.conflicting_saves) {
            return Ok(SaveOutcome::VersionConflict {
                current_version: expected_version + 1,
            });
        }
        save()
    }

    fn unreachable() -> AppError {
        AppError::StorageMessage("store unreachable".to_string())
    }
}

impl PasteStore for ScriptedStore {
    fn insert(&self, draft: Paste) -> Result<Paste, AppError> {
        self.inner.insert(draft)
    }

    fn get(&self, id: &str) -> Result<Option<Paste>, AppError> {
        if Self::take(&self.failing_gets) {
            return Err(Self::unreachable());
        }
        if let Some(row) = self.stale_rows.lock().expect("stale rows lock").pop() {
            return Ok(Some(row));
        }
        self.inner.get(id)
    }

    fn conditional_save(
        &self,
        paste: &Paste,
        expected_version: u64,
    ) -> Result<SaveOutcome, AppError> {
        self.scripted_save(expected_version, || {
            self.inner.conditional_save(paste, expected_version)
        })
    }

    fn conditional_save_acking(
        &self,
        paste: &Paste,
        expected_version: u64,
        seq: u64,
    ) -> Result<SaveOutcome, AppError> {
        self.scripted_save(expected_version, || {
            self.inner.conditional_save_acking(paste, expected_version, seq)
        })
    }

    fn bulk_update_where(
        &self,
        predicate: &dyn Fn(&Paste) -> bool,
        patch: &dyn Fn(&mut Paste),
    ) -> Result<usize, AppError> {
        if Self::take(&self.failing_bulk) {
            return Err(Self::unreachable());
        }
        self.inner.bulk_update_where(predicate, patch)
    }

    fn bulk_delete_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<usize, AppError> {
        if Self::take(&self.failing_bulk) {
            return Err(Self::unreachable());
        }
        self.inner.bulk_delete_where(predicate)
    }

    fn count_all(&self) -> Result<usize, AppError> {
        self.inner.count_all()
    }

    fn scan_where(&self, predicate: &dyn Fn(&Paste) -> bool) -> Result<Vec<Paste>, AppError> {
        self.inner.scan_where(predicate)
    }
}
