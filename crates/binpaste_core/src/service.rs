//! Paste operations exposed to the transport layer.

use crate::burn;
use crate::config::Config;
use crate::constants::{SEARCH_TERM_MAX_CHARS, SEARCH_TERM_MIN_CHARS};
use crate::db::{store::PasteStore, Database};
use crate::error::AppError;
use crate::models::paste::{CreatePasteRequest, DetailView, ListItemView, SearchItemView};
use crate::mutation::{mutate, RetryPolicy};
use crate::search::ProviderChain;
use crate::tracking::TrackingSender;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Facade tying storage, burn, tracking, and search together.
///
/// Requester fingerprints are opaque strings (usually the client address)
/// used only for the public erase window.
pub struct PasteService {
    store: Arc<dyn PasteStore>,
    search: ProviderChain,
    tracking: TrackingSender,
    foreground: RetryPolicy,
    max_paste_size: usize,
}

impl PasteService {
    pub fn new(
        store: Arc<dyn PasteStore>,
        search: ProviderChain,
        tracking: TrackingSender,
        max_paste_size: usize,
    ) -> Self {
        Self {
            store,
            search,
            tracking,
            foreground: RetryPolicy::foreground(),
            max_paste_size,
        }
    }

    /// Build the standard service over `db`: word-index search with substring
    /// fallback, and the configured paste size limit.
    pub fn from_database(db: &Database, tracking: TrackingSender, config: &Config) -> Self {
        let store: Arc<dyn PasteStore> = db.pastes.clone();
        Self::new(
            store.clone(),
            ProviderChain::standard(store),
            tracking,
            config.max_paste_size,
        )
    }

    /// Override the retry budget used by burn and deletion.
    pub fn with_foreground_policy(mut self, policy: RetryPolicy) -> Self {
        self.foreground = policy;
        self
    }

    /// Validate and store a new paste.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] for invalid requests, or a storage error.
    pub fn create(
        &self,
        request: CreatePasteRequest,
        requester: Option<&str>,
    ) -> Result<DetailView, AppError> {
        request.validate(self.max_paste_size)?;
        let now = Utc::now();
        let draft = request.into_paste(requester.map(str::to_string), now);
        let stored = self.store.insert(draft)?;
        info!(
            paste_id = %stored.id,
            exposure = ?stored.exposure,
            size = stored.size_in_bytes(),
            "Created paste"
        );
        Ok(DetailView::of(&stored, requester, now))
    }

    /// Read a legitimate paste.
    ///
    /// Public reads are counted through the tracking pipeline. One-time pastes
    /// are described without title or content; revealing them takes [`Self::burn`].
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for unknown or illegitimate pastes.
    pub fn find(&self, id: &str, requester: Option<&str>) -> Result<DetailView, AppError> {
        let now = Utc::now();
        let paste = self.store.get_legit(id, now)?.ok_or(AppError::NotFound)?;

        if paste.is_one_time() {
            return Ok(DetailView::redacted(&paste, requester, now));
        }
        if paste.is_public() {
            self.tracking.track_view(&paste.id, now);
        }
        Ok(DetailView::of(&paste, requester, now))
    }

    /// Reveal a one-time paste, burning it in the same step.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no unburnt one-time paste exists, or
    /// [`AppError::Conflict`] when contention outlasts the retry budget.
    pub fn burn(&self, id: &str, requester: Option<&str>) -> Result<DetailView, AppError> {
        let original = burn::burn(self.store.as_ref(), id, &self.foreground)?;
        Ok(DetailView::of(&original, requester, Utc::now()))
    }

    /// Newest public legitimate pastes.
    pub fn list(&self, limit: usize) -> Result<Vec<ListItemView>, AppError> {
        let pastes = self.store.list_legit(Utc::now(), limit)?;
        Ok(pastes.iter().map(ListItemView::from).collect())
    }

    /// Full-text search over public legitimate pastes.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] when `term` is outside the accepted length.
    pub fn search(&self, term: &str) -> Result<Vec<SearchItemView>, AppError> {
        let length = term.chars().count();
        if !(SEARCH_TERM_MIN_CHARS..=SEARCH_TERM_MAX_CHARS).contains(&length) {
            return Err(AppError::BadRequest(format!(
                "Search term must be between {} and {} characters",
                SEARCH_TERM_MIN_CHARS, SEARCH_TERM_MAX_CHARS
            )));
        }
        let hits = self.search.search(term, Utc::now())?;
        Ok(hits
            .iter()
            .map(|paste| SearchItemView::of(paste, term))
            .collect())
    }

    /// Expire a paste on behalf of `requester`.
    ///
    /// Each attempt judges the row against a fresh clock reading, so a retry
    /// never trusts an instant captured before a competing write landed.
    ///
    /// # Errors
    /// - [`AppError::NotFound`] when the paste is unknown or already gone.
    /// - [`AppError::Forbidden`] when `requester` may not erase it.
    /// - [`AppError::Conflict`] when contention outlasts the retry budget.
    pub fn request_deletion(&self, id: &str, requester: Option<&str>) -> Result<(), AppError> {
        mutate(self.store.as_ref(), id, &self.foreground, |paste| {
            let now = Utc::now();
            if !paste.is_legitimate(now) {
                return Err(AppError::NotFound);
            }
            if !paste.is_erasable_by(requester, now) {
                return Err(AppError::Forbidden(
                    "Paste can no longer be deleted by this requester".to_string(),
                ));
            }
            paste.mark_expired(now);
            Ok(())
        })?;

        info!(paste_id = id, requester = ?requester, "Deleted paste on request");
        Ok(())
    }
}
