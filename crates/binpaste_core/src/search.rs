//! Full-text search over public pastes with an ordered provider fallback.

use crate::db::store::PasteStore;
use crate::error::AppError;
use crate::models::paste::Paste;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Minimum token length indexed by [`WordIndexProvider`].
pub const MIN_INDEXED_TOKEN_CHARS: usize = 3;

/// A read-only search backend.
///
/// Implementations must only return public, legitimate pastes.
pub trait FullTextProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Find pastes matching `term` at `now`, newest first.
    fn search(&self, term: &str, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError>;
}

fn searchable(paste: &Paste, now: DateTime<Utc>) -> bool {
    paste.is_public() && paste.is_legitimate(now)
}

fn newest_first(mut pastes: Vec<Paste>) -> Vec<Paste> {
    pastes.sort_by(|a, b| b.date_created.cmp(&a.date_created));
    pastes
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_INDEXED_TOKEN_CHARS)
        .map(str::to_lowercase)
}

/// Whole-word, case-insensitive matcher.
///
/// Behaves like a database-native word index: tokens shorter than
/// [`MIN_INDEXED_TOKEN_CHARS`] are never indexed, so short or partial-word
/// queries find nothing here and fall through to the next provider.
pub struct WordIndexProvider {
    store: Arc<dyn PasteStore>,
}

impl WordIndexProvider {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }
}

impl FullTextProvider for WordIndexProvider {
    fn name(&self) -> &str {
        "word-index"
    }

    fn search(&self, term: &str, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
        let wanted: Vec<String> = tokens(term).collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.store.scan_where(&|paste| {
            if !searchable(paste, now) {
                return false;
            }
            let mut words = HashSet::new();
            if let Some(title) = &paste.title {
                words.extend(tokens(title));
            }
            if !paste.is_encrypted {
                words.extend(tokens(&paste.content));
            }
            wanted.iter().all(|token| words.contains(token))
        })?;
        Ok(newest_first(hits))
    }
}

/// Plain substring matcher over titles and unencrypted content.
///
/// Matches any term of any length, so it serves as the universal fallback.
pub struct SubstringProvider {
    store: Arc<dyn PasteStore>,
}

impl SubstringProvider {
    pub fn new(store: Arc<dyn PasteStore>) -> Self {
        Self { store }
    }
}

impl FullTextProvider for SubstringProvider {
    fn name(&self) -> &str {
        "substring"
    }

    fn search(&self, term: &str, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
        if term.is_empty() {
            return Ok(Vec::new());
        }
        let hits = self.store.scan_where(&|paste| {
            searchable(paste, now)
                && (paste.title.as_deref().is_some_and(|title| title.contains(term))
                    || (!paste.is_encrypted && paste.content.contains(term)))
        })?;
        Ok(newest_first(hits))
    }
}

/// Ordered list of providers consulted until one finds something.
pub struct ProviderChain {
    providers: Vec<Box<dyn FullTextProvider>>,
}

impl ProviderChain {
    /// Build a chain from providers in priority order.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] when `providers` is empty.
    pub fn new(providers: Vec<Box<dyn FullTextProvider>>) -> Result<Self, AppError> {
        if providers.is_empty() {
            return Err(AppError::BadRequest(
                "Search chain needs at least one provider".to_string(),
            ));
        }
        Ok(Self { providers })
    }

    /// Word index first, substring scan as fallback.
    pub fn standard(store: Arc<dyn PasteStore>) -> Self {
        Self {
            providers: vec![
                Box::new(WordIndexProvider::new(store.clone())),
                Box::new(SubstringProvider::new(store)),
            ],
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Run providers in order and return the first non-empty result.
    ///
    /// A failing provider is logged and treated as having found nothing.
    ///
    /// # Errors
    /// Returns the last provider error only when every provider failed.
    pub fn search(&self, term: &str, now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
        let mut failures = 0;
        let mut last_error = None;

        for (idx, provider) in self.providers.iter().enumerate() {
            match provider.search(term, now) {
                Ok(hits) if !hits.is_empty() => return Ok(hits),
                Ok(_) => {
                    if let Some(next) = self.providers.get(idx + 1) {
                        warn!(
                            provider = provider.name(),
                            fallback = next.name(),
                            "Full-text search found nothing for '{}'",
                            term
                        );
                    }
                }
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "Full-text provider failed");
                    failures += 1;
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if failures == self.providers.len() => Err(err),
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::paste::Exposure;
    use crate::test_support::setup_temp_db;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn insert(db: &Database, title: Option<&str>, content: &str, exposure: Exposure) -> Paste {
        let mut paste = Paste::new(content.to_string(), exposure);
        paste.title = title.map(str::to_string);
        db.pastes.insert(paste).expect("insert")
    }

    struct CountingProvider {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        result: Result<Vec<Paste>, String>,
    }

    impl FullTextProvider for CountingProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn search(&self, _term: &str, _now: DateTime<Utc>) -> Result<Vec<Paste>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(AppError::StorageMessage)
        }
    }

    fn counting(
        name: &'static str,
        result: Result<Vec<Paste>, String>,
    ) -> (Box<dyn FullTextProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            name,
            calls: calls.clone(),
            result,
        };
        (Box::new(provider), calls)
    }

    fn sample(content: &str) -> Paste {
        Paste::new(content.to_string(), Exposure::Public)
    }

    #[test]
    fn chain_falls_back_when_first_is_empty() {
        let (first, first_calls) = counting("first", Ok(Vec::new()));
        let (second, second_calls) = counting("second", Ok(vec![sample("found")]));
        let chain = ProviderChain::new(vec![first, second]).unwrap();

        let hits = chain.search("term", Utc::now()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "found");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn chain_short_circuits_on_first_hit() {
        let (first, first_calls) = counting("first", Ok(vec![sample("first hit")]));
        let (second, second_calls) = counting("second", Ok(vec![sample("never")]));
        let chain = ProviderChain::new(vec![first, second]).unwrap();

        let hits = chain.search("term", Utc::now()).unwrap();
        assert_eq!(hits[0].content, "first hit");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn chain_returns_empty_when_all_empty() {
        let (first, _) = counting("first", Ok(Vec::new()));
        let (second, _) = counting("second", Ok(Vec::new()));
        let chain = ProviderChain::new(vec![first, second]).unwrap();
        assert!(chain.search("term", Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn chain_treats_provider_failure_as_empty() {
        let (first, _) = counting("first", Err("index offline".to_string()));
        let (second, _) = counting("second", Ok(vec![sample("fallback")]));
        let chain = ProviderChain::new(vec![first, second]).unwrap();
        assert_eq!(chain.search("term", Utc::now()).unwrap().len(), 1);

        let (only, _) = counting("only", Err("index offline".to_string()));
        let chain = ProviderChain::new(vec![only]).unwrap();
        assert!(matches!(
            chain.search("term", Utc::now()),
            Err(AppError::StorageMessage(_))
        ));
    }

    #[test]
    fn chain_rejects_empty_provider_list() {
        assert!(matches!(
            ProviderChain::new(Vec::new()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn word_index_matches_whole_words_case_insensitively() {
        let (db, _temp) = setup_temp_db();
        let hit = insert(&db, Some("Notes"), "Lorem ipsum dolor", Exposure::Public);
        let provider = WordIndexProvider::new(db.pastes.clone());
        let now = Utc::now();

        assert_eq!(provider.search("LOREM", now).unwrap()[0].id, hit.id);
        assert_eq!(provider.search("notes", now).unwrap()[0].id, hit.id);
        assert!(provider.search("ips", now).unwrap().is_empty(), "partial word");
        assert!(provider.search("do", now).unwrap().is_empty(), "below token minimum");
    }

    #[test]
    fn substring_matches_fragments_but_skips_encrypted_content() {
        let (db, _temp) = setup_temp_db();
        let plain = insert(&db, None, "Lorem ipsum dolor", Exposure::Public);
        let mut encrypted = Paste::new("ipsum ciphertext".to_string(), Exposure::Public);
        encrypted.is_encrypted = true;
        encrypted.title = Some("ipsum title".to_string());
        let encrypted = db.pastes.insert(encrypted).unwrap();
        let provider = SubstringProvider::new(db.pastes.clone());
        let now = Utc::now();

        let ids: Vec<String> = provider
            .search("ips", now)
            .unwrap()
            .into_iter()
            .map(|paste| paste.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&plain.id));
        assert!(ids.contains(&encrypted.id), "title still searchable");

        assert!(provider.search("cipher", now).unwrap().is_empty());
    }

    #[test]
    fn providers_only_return_public_legitimate_pastes() {
        let (db, _temp) = setup_temp_db();
        insert(&db, None, "hidden lorem", Exposure::Unlisted);
        insert(&db, None, "burnable lorem", Exposure::OneTime);
        let mut expired = Paste::new("expired lorem".to_string(), Exposure::Public);
        expired.date_of_expiry = Some(Utc::now() - chrono::Duration::hours(1));
        db.pastes.insert(expired).unwrap();
        let visible = insert(&db, None, "visible lorem", Exposure::Public);

        let chain = ProviderChain::standard(db.pastes.clone());
        assert_eq!(chain.provider_names(), vec!["word-index", "substring"]);
        let hits = chain.search("lorem", Utc::now()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, visible.id);
    }

    #[test]
    fn standard_chain_falls_back_to_substring_for_short_terms() {
        let (db, _temp) = setup_temp_db();
        let paste = insert(&db, None, "abcdef", Exposure::Public);
        let chain = ProviderChain::standard(db.pastes.clone());
        let hits = chain.search("bcd", Utc::now()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, paste.id);
    }
}
