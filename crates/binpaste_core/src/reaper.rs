//! Periodic expiry and retention sweeps.

use crate::db::store::PasteStore;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

/// Soft-expire and purge jobs over the paste store.
///
/// Both sweeps are single bulk statements with disjoint predicates, so they
/// are safe to re-run and to run concurrently.
#[derive(Clone)]
pub struct Reaper {
    store: Arc<dyn PasteStore>,
    retention: chrono::Duration,
}

/// Outcome of one [`Reaper::run_once`]; `None` marks a failed sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub soft_expired: Option<usize>,
    pub purged: Option<usize>,
}

impl Reaper {
    /// # Arguments
    /// - `store`: Paste store to sweep.
    /// - `retention`: How long soft-deleted rows are kept before purge.
    pub fn new(store: Arc<dyn PasteStore>, retention: chrono::Duration) -> Self {
        Self { store, retention }
    }

    /// Soft-delete every row whose expiry has passed and that is not yet deleted.
    ///
    /// # Returns
    /// Number of rows soft-deleted.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn soft_expire_sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let count = self.store.bulk_update_where(
            &|paste| {
                paste.date_deleted.is_none()
                    && paste.date_of_expiry.is_some_and(|expiry| expiry < now)
            },
            &|paste| paste.date_deleted = Some(now),
        )?;

        if count == 0 {
            info!("No expired pastes to soft-delete");
        } else {
            warn!(count, "Soft-deleted expired pastes");
        }
        Ok(count)
    }

    /// Permanently remove rows soft-deleted before `now - retention`.
    ///
    /// Rows that were never soft-deleted are never purged.
    ///
    /// # Returns
    /// Number of rows removed.
    ///
    /// # Errors
    /// Returns [`AppError::Scheduling`] when the cutoff falls outside the
    /// representable date range, and propagates store failures.
    pub fn purge_sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let cutoff = now.checked_sub_signed(self.retention).ok_or_else(|| {
            AppError::Scheduling(format!(
                "Retention of {} days reaches past the earliest representable date",
                self.retention.num_days()
            ))
        })?;
        let count = self
            .store
            .bulk_delete_where(&|paste| paste.date_deleted.is_some_and(|deleted| deleted < cutoff))?;

        if count == 0 {
            info!(%cutoff, "No soft-deleted pastes past retention");
        } else {
            warn!(count, %cutoff, "Purged soft-deleted pastes");
        }
        Ok(count)
    }

    /// Run both sweeps, logging failures instead of propagating them.
    pub fn run_once(&self, now: DateTime<Utc>) -> SweepReport {
        SweepReport {
            soft_expired: log_failure("soft-expire", self.soft_expire_sweep(now)),
            purged: log_failure("purge", self.purge_sweep(now)),
        }
    }
}

fn log_failure(job: &str, result: Result<usize, AppError>) -> Option<usize> {
    match result {
        Ok(count) => Some(count),
        Err(err) => {
            let err = AppError::Scheduling(format!("{} sweep failed: {}", job, err));
            error!(error = %err, "Sweep will be retried on the next run");
            None
        }
    }
}

/// Fixed-cadence trigger for a [`Reaper`] on a dedicated thread.
pub struct ReaperScheduler {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReaperScheduler {
    /// Start running `reaper` every `interval`, first run one interval from now.
    ///
    /// # Errors
    /// Returns [`AppError::Scheduling`] if the thread cannot be spawned.
    pub fn start(reaper: Reaper, interval: Duration) -> Result<Self, AppError> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("binpaste-reaper".to_string())
            .spawn(move || {
                info!(interval_secs = interval.as_secs(), "Reaper scheduler started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            reaper.run_once(Utc::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("Reaper scheduler stopped");
            })
            .map_err(|err| AppError::Scheduling(format!("Failed to spawn reaper: {}", err)))?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Stop the scheduler, waiting for a sweep in progress to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if handle.join().is_err() {
            error!("Reaper thread panicked");
        }
    }
}

impl Drop for ReaperScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
