//! Paste entity, lifecycle transitions, and API payload models.

use crate::constants::{
    HIGHLIGHT_RANGE, MAX_TITLE_CHARS, MIN_CONTENT_CHARS, PUBLIC_ERASE_WINDOW_MINUTES,
};
use crate::error::AppError;
use crate::id::generate_paste_id;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Visibility mode of a paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exposure {
    /// Listed, searchable, and view-tracked.
    Public,
    /// Reachable only by id.
    Unlisted,
    /// Burns after its first successful read.
    #[serde(rename = "ONCE")]
    OneTime,
}

/// Paste row as persisted by the store.
///
/// `version` is managed by the store and only used for optimistic conflict
/// detection; it never leaves the core through API views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paste {
    pub id: String,
    pub version: u64,
    pub title: Option<String>,
    pub content: String,
    pub is_encrypted: bool,
    pub exposure: Exposure,
    pub date_created: DateTime<Utc>,
    pub date_of_expiry: Option<DateTime<Utc>>,
    pub date_deleted: Option<DateTime<Utc>>,
    pub remote_address: Option<String>,
    pub last_viewed: Option<DateTime<Utc>>,
    pub views: u64,
}

impl Paste {
    /// Create a new, permanent, unencrypted paste with a fresh id.
    ///
    /// # Arguments
    /// - `content`: Paste content.
    /// - `exposure`: Visibility mode, fixed for the paste's lifetime.
    ///
    /// # Returns
    /// A new [`Paste`] at version 0 with no views.
    pub fn new(content: String, exposure: Exposure) -> Self {
        Self {
            id: generate_paste_id(),
            version: 0,
            title: None,
            content,
            is_encrypted: false,
            exposure,
            date_created: Utc::now(),
            date_of_expiry: None,
            date_deleted: None,
            remote_address: None,
            last_viewed: None,
            views: 0,
        }
    }

    pub fn is_public(&self) -> bool {
        self.exposure == Exposure::Public
    }

    pub fn is_unlisted(&self) -> bool {
        self.exposure == Exposure::Unlisted
    }

    pub fn is_one_time(&self) -> bool {
        self.exposure == Exposure::OneTime
    }

    /// A paste without an expiry date never expires on its own.
    pub fn is_permanent(&self) -> bool {
        self.date_of_expiry.is_none()
    }

    /// Whether the expiry instant has been reached at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.date_of_expiry
            .map(|expiry| expiry <= now)
            .unwrap_or(false)
    }

    /// Whether a one-time paste has already been revealed.
    ///
    /// One-time pastes are never view-tracked, so `last_viewed` is only ever
    /// set by [`Paste::burn`]. The answer does not depend on any clock.
    pub fn is_burnt(&self) -> bool {
        self.is_one_time() && self.last_viewed.is_some()
    }

    /// Whether the paste is visible to reads, lists, and search at `now`.
    ///
    /// # Returns
    /// `true` when the row is not soft-deleted, not burnt, and has not expired.
    pub fn is_legitimate(&self, now: DateTime<Utc>) -> bool {
        self.date_deleted.is_none() && !self.is_burnt() && !self.is_expired(now)
    }

    /// Expire the paste at `now`.
    ///
    /// Already-expired pastes are left untouched so the transition stays
    /// idempotent under retries. A future expiry is pulled forward to `now`;
    /// expiry is never moved later.
    ///
    /// # Returns
    /// `true` when `date_of_expiry` changed.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            return false;
        }
        self.date_of_expiry = Some(now);
        true
    }

    /// Consume a one-time paste at `now`: stamp the reveal and expire it.
    ///
    /// # Returns
    /// `false`, leaving the row untouched, unless this is a legitimate
    /// one-time paste at `now`.
    pub fn burn(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_one_time() || !self.is_legitimate(now) {
            return false;
        }
        self.last_viewed = Some(now);
        self.mark_expired(now);
        true
    }

    /// Count one view observed at `viewed_at`.
    ///
    /// `last_viewed` only moves forward; `views` always increments.
    pub fn track_view(&mut self, viewed_at: DateTime<Utc>) {
        match self.last_viewed {
            Some(last) if last >= viewed_at => {}
            _ => self.last_viewed = Some(viewed_at),
        }
        self.views = self.views.saturating_add(1);
    }

    /// Decide whether `requester` may erase this paste at `now`.
    ///
    /// Unlisted pastes and unburnt one-time pastes are erasable by anyone. A
    /// public paste is erasable only by the fingerprint that created it, and
    /// only within the first hour.
    pub fn is_erasable_by(&self, requester: Option<&str>, now: DateTime<Utc>) -> bool {
        match self.exposure {
            Exposure::Unlisted => true,
            Exposure::OneTime => !self.is_burnt() && !self.is_expired(now),
            Exposure::Public => {
                let same_author = matches!(
                    (requester, self.remote_address.as_deref()),
                    (Some(requester), Some(author)) if requester == author
                );
                same_author
                    && now - self.date_created < Duration::minutes(PUBLIC_ERASE_WINDOW_MINUTES)
            }
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.content.len()
    }
}

/// Expiry presets offered to clients when creating a paste.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpiryRange {
    OneHour,
    #[default]
    OneDay,
    OneWeek,
    OneMonth,
    ThreeMonths,
    OneYear,
    Never,
}

impl ExpiryRange {
    /// Resolve the preset to an absolute expiry relative to `now`.
    ///
    /// # Returns
    /// `None` for [`ExpiryRange::Never`], otherwise the expiry instant.
    pub fn to_timestamp(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let add_months = |months: u32, fallback_days: i64| {
            now.checked_add_months(Months::new(months))
                .unwrap_or(now + Duration::days(fallback_days))
        };
        match self {
            Self::OneHour => Some(now + Duration::hours(1)),
            Self::OneDay => Some(now + Duration::days(1)),
            Self::OneWeek => Some(now + Duration::weeks(1)),
            Self::OneMonth => Some(add_months(1, 30)),
            Self::ThreeMonths => Some(add_months(3, 91)),
            Self::OneYear => Some(add_months(12, 365)),
            Self::Never => None,
        }
    }
}

/// Request payload for creating a paste.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePasteRequest {
    pub title: Option<String>,
    pub content: String,
    pub is_encrypted: Option<bool>,
    pub expiry: Option<ExpiryRange>,
    pub exposure: Option<Exposure>,
}

impl CreatePasteRequest {
    /// Validate the request against size and shape limits.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] describing the first violated rule.
    pub fn validate(&self, max_paste_size: usize) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(AppError::BadRequest(
                    "Title must not be blank when provided".to_string(),
                ));
            }
            if trimmed.chars().count() > MAX_TITLE_CHARS {
                return Err(AppError::BadRequest(format!(
                    "Title exceeds maximum of {} characters",
                    MAX_TITLE_CHARS
                )));
            }
        }
        if self.content.trim().is_empty() {
            return Err(AppError::BadRequest("Content must not be blank".to_string()));
        }
        if self.content.chars().count() < MIN_CONTENT_CHARS {
            return Err(AppError::BadRequest(format!(
                "Content must be at least {} characters",
                MIN_CONTENT_CHARS
            )));
        }
        if self.content.len() > max_paste_size {
            return Err(AppError::BadRequest(format!(
                "Paste size exceeds maximum of {} bytes",
                max_paste_size
            )));
        }
        Ok(())
    }

    /// Build the paste draft described by this request.
    ///
    /// # Arguments
    /// - `remote_address`: Creator fingerprint, kept for the erase window rule.
    /// - `now`: Reference instant for the expiry preset.
    ///
    /// # Returns
    /// A new unsaved [`Paste`].
    pub fn into_paste(self, remote_address: Option<String>, now: DateTime<Utc>) -> Paste {
        let mut paste = Paste::new(self.content, self.exposure.unwrap_or(Exposure::Public));
        paste.title = self.title.map(|title| title.trim().to_string());
        paste.is_encrypted = self.is_encrypted.unwrap_or(false);
        paste.date_of_expiry = self.expiry.unwrap_or_default().to_timestamp(now);
        paste.remote_address = remote_address;
        paste
    }
}

/// Query parameters for full-text search.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub term: String,
}

/// Full single-paste view returned by read, burn, and create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub size_in_bytes: usize,
    pub is_public: bool,
    pub is_erasable: bool,
    pub is_encrypted: bool,
    pub is_one_time: bool,
    pub is_permanent: bool,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed: Option<DateTime<Utc>>,
    pub views: u64,
}

impl DetailView {
    /// Build the full view of `paste` as seen by `requester`.
    pub fn of(paste: &Paste, requester: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            id: paste.id.clone(),
            title: paste.title.clone(),
            content: Some(paste.content.clone()),
            size_in_bytes: paste.size_in_bytes(),
            is_public: paste.is_public(),
            is_erasable: paste.is_erasable_by(requester, now),
            is_encrypted: paste.is_encrypted,
            is_one_time: paste.is_one_time(),
            is_permanent: paste.is_permanent(),
            date_created: paste.date_created,
            date_of_expiry: paste.date_of_expiry,
            last_viewed: paste.last_viewed,
            views: paste.views,
        }
    }

    /// Build a view that withholds title and content.
    ///
    /// Used for one-time pastes on the plain read path, where revealing
    /// content would have to burn the paste.
    pub fn redacted(paste: &Paste, requester: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            title: None,
            content: None,
            ..Self::of(paste, requester, now)
        }
    }
}

/// Compact list entry for the public paste list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListItemView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub size_in_bytes: usize,
    pub is_encrypted: bool,
    pub is_permanent: bool,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<DateTime<Utc>>,
}

impl From<&Paste> for ListItemView {
    fn from(paste: &Paste) -> Self {
        Self {
            id: paste.id.clone(),
            title: paste.title.clone(),
            size_in_bytes: paste.size_in_bytes(),
            is_encrypted: paste.is_encrypted,
            is_permanent: paste.is_permanent(),
            date_created: paste.date_created,
            date_of_expiry: paste.date_of_expiry,
        }
    }
}

/// Search hit with a content snippet around the matched term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchItemView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub highlight: String,
    pub size_in_bytes: usize,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiry: Option<DateTime<Utc>>,
}

impl SearchItemView {
    pub fn of(paste: &Paste, term: &str) -> Self {
        Self {
            id: paste.id.clone(),
            title: paste.title.clone(),
            highlight: highlight(&paste.content, term),
            size_in_bytes: paste.size_in_bytes(),
            date_created: paste.date_created,
            date_of_expiry: paste.date_of_expiry,
        }
    }
}

/// Cut a snippet of `content` around the first occurrence of `term`.
///
/// Falls back to the leading `2 * HIGHLIGHT_RANGE` characters when the term
/// does not occur verbatim. Works on characters, never splitting a code point.
pub fn highlight(content: &str, term: &str) -> String {
    let found = if term.is_empty() {
        None
    } else {
        content.find(term)
    };
    let Some(byte_idx) = found else {
        return content
            .chars()
            .take(2 * HIGHLIGHT_RANGE)
            .collect::<String>()
            .trim()
            .to_string();
    };

    let char_idx = content[..byte_idx].chars().count();
    let start = char_idx.saturating_sub(HIGHLIGHT_RANGE);
    let end = char_idx + term.chars().count() + HIGHLIGHT_RANGE;
    content
        .chars()
        .skip(start)
        .take(end - start)
        .collect::<String>()
        .trim()
        .to_string()
}
