//! Optimistic read-modify-write of a single paste row.
//!
//! Every write to an existing paste goes through [`mutate`]: fetch the row and
//! its version, apply a closure to a private copy, then persist only if the
//! stored version is unchanged. Lost races and transient storage failures are
//! retried with exponential backoff up to a bounded attempt count.

use crate::db::store::{PasteStore, SaveOutcome};
use crate::error::AppError;
use crate::models::paste::Paste;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and backoff curve for [`mutate`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied after every failed attempt.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
    /// Randomize each delay by ±30%.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Budget for request-path callers (burn, deletion).
    pub fn foreground() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            multiplier: 1.5,
            max_backoff: Duration::from_secs(1),
            jitter: true,
        }
    }

    /// Budget for the tracking worker, which can afford to wait longer.
    pub fn background() -> Self {
        Self {
            max_attempts: 8,
            initial_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(2),
            jitter: true,
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(current.as_secs_f64() * self.multiplier).min(self.max_backoff)
    }

    fn jittered(&self, base: Duration) -> Duration {
        if !self.jitter {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
        base.mul_f64(factor)
    }
}

/// Apply `f` to the paste `id` under optimistic concurrency control.
///
/// `f` receives a fresh copy of the stored row on every attempt and may be
/// called more than once; it must derive its changes from the copy alone.
///
/// # Arguments
/// - `store`: Backing paste store.
/// - `id`: Paste to mutate.
/// - `policy`: Attempt budget and backoff curve.
/// - `f`: Mutation to apply; an `Err` aborts without writing or retrying.
///
/// # Returns
/// The persisted row (with its new version) and the value produced by `f`.
///
/// # Errors
/// - [`AppError::NotFound`] when the row does not exist or vanishes mid-flight.
/// - Any error returned by `f`.
/// - [`AppError::Conflict`] when the budget ran out on version conflicts.
/// - The last transient storage error when the budget ran out on those.
pub fn mutate<T, F>(
    store: &dyn PasteStore,
    id: &str,
    policy: &RetryPolicy,
    f: F,
) -> Result<(Paste, T), AppError>
where
    F: FnMut(&mut Paste) -> Result<T, AppError>,
{
    mutate_with(store, id, policy, f, |next, expected_version| {
        store.conditional_save(next, expected_version)
    })
}

/// [`mutate`] whose winning write also acknowledges tracking delivery `seq`.
///
/// Losing attempts acknowledge nothing, so the delivery stays pending until
/// the change it carries is durable.
///
/// # Errors
/// Same as [`mutate`].
pub fn mutate_and_ack<T, F>(
    store: &dyn PasteStore,
    id: &str,
    policy: &RetryPolicy,
    seq: u64,
    f: F,
) -> Result<(Paste, T), AppError>
where
    F: FnMut(&mut Paste) -> Result<T, AppError>,
{
    mutate_with(store, id, policy, f, |next, expected_version| {
        store.conditional_save_acking(next, expected_version, seq)
    })
}

fn mutate_with<T, F, S>(
    store: &dyn PasteStore,
    id: &str,
    policy: &RetryPolicy,
    mut f: F,
    save: S,
) -> Result<(Paste, T), AppError>
where
    F: FnMut(&mut Paste) -> Result<T, AppError>,
    S: Fn(&Paste, u64) -> Result<SaveOutcome, AppError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut last_transient: Option<AppError> = None;

    for attempt in 1..=max_attempts {
        last_transient = match store.get(id) {
            Ok(Some(current)) => {
                let expected_version = current.version;
                let mut next = current;
                let output = f(&mut next)?;
                match save(&next, expected_version) {
                    Ok(SaveOutcome::Saved(saved)) => return Ok((saved, output)),
                    Ok(SaveOutcome::VersionConflict { current_version }) => {
                        debug!(
                            paste_id = id,
                            attempt,
                            expected_version,
                            current_version,
                            "Lost optimistic write race"
                        );
                        None
                    }
                    Ok(SaveOutcome::Missing) => return Err(AppError::NotFound),
                    Err(err) if err.is_transient() => Some(err),
                    Err(err) => return Err(err),
                }
            }
            Ok(None) => return Err(AppError::NotFound),
            Err(err) if err.is_transient() => Some(err),
            Err(err) => return Err(err),
        };

        if let Some(err) = &last_transient {
            warn!(paste_id = id, attempt, error = %err, "Transient store failure during mutation");
        }
        if attempt < max_attempts {
            std::thread::sleep(policy.jittered(backoff));
            backoff = policy.next_backoff(backoff);
        }
    }

    match last_transient {
        Some(err) => Err(err),
        None => Err(AppError::Conflict {
            id: id.to_string(),
            attempts: max_attempts,
        }),
    }
}
