//! Read-once semantics for one-time pastes.

use crate::db::store::PasteStore;
use crate::error::AppError;
use crate::models::paste::Paste;
use crate::mutation::{mutate, RetryPolicy};
use chrono::Utc;

/// Reveal and burn the one-time paste `id`.
///
/// The burn is a single optimistic mutation that stamps the reveal and expires
/// the paste. Every attempt reads the clock afresh, and a burnt row is
/// recognised by its reveal stamp rather than by comparing expiry to a clock,
/// so a caller whose clock lags the winner's still sees the row as burnt.
/// Among any number of racing callers exactly one wins its conditional write;
/// every other caller either reads the burnt row or loses the version race,
/// re-reads, and then sees it burnt.
///
/// # Returns
/// The paste as it was before the burn, including its content.
///
/// # Errors
/// Returns [`AppError::NotFound`] for unknown ids, for pastes that are not
/// one-time, and for pastes that are already burnt, expired, or soft-deleted.
pub fn burn(store: &dyn PasteStore, id: &str, policy: &RetryPolicy) -> Result<Paste, AppError> {
    let (_, original) = mutate(store, id, policy, |paste| {
        let original = paste.clone();
        if !paste.burn(Utc::now()) {
            return Err(AppError::NotFound);
        }
        Ok(original)
    })?;

    tracing::info!(paste_id = id, "One-time paste burnt");
    Ok(original)
}
