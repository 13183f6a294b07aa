//! Overridable verse text store.
//!
//! Verse text pushed through the bulk endpoint lands here and takes
//! precedence over provider or generated text. The store is an injectable
//! trait object so a deployment can swap the in-memory map for a real
//! datastore without touching the handlers.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::reference::resolve_book;
use crate::segment::VerseRecord;

/// Key of one stored verse. `book` is always the canonical book name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerseKey {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
}

impl VerseKey {
    pub fn new(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book: book.into(),
            chapter,
            verse,
        }
    }
}

/// One entry of a bulk update as received from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseUpdate {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

/// Outcome of [`merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    /// Updates whose book, chapter or verse did not resolve.
    pub rejected: Vec<RejectedUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedUpdate {
    pub index: usize,
    pub error: String,
}

/// Key-value store for verse overrides.
pub trait VerseStore: Send + Sync {
    fn get(&self, key: &VerseKey) -> Option<String>;

    /// Insert or replace; returns the previous text if any.
    fn upsert(&self, key: VerseKey, text: String) -> Option<String>;

    /// All stored verses of one chapter, ascending by verse number.
    fn chapter(&self, book: &str, chapter: u32) -> Vec<VerseRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store. Not durable and not shared across instances.
#[derive(Debug, Default)]
pub struct InMemoryVerseStore {
    verses: RwLock<BTreeMap<VerseKey, String>>,
}

impl InMemoryVerseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VerseStore for InMemoryVerseStore {
    fn get(&self, key: &VerseKey) -> Option<String> {
        self.verses.read().get(key).cloned()
    }

    fn upsert(&self, key: VerseKey, text: String) -> Option<String> {
        self.verses.write().insert(key, text)
    }

    fn chapter(&self, book: &str, chapter: u32) -> Vec<VerseRecord> {
        let start = VerseKey::new(book, chapter, 0);
        let end = VerseKey::new(book, chapter, u32::MAX);
        self.verses
            .read()
            .range(start..=end)
            .map(|(k, text)| VerseRecord::new(k.verse, text.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.verses.read().len()
    }
}

/// Apply updates in order, last write wins.
///
/// Book names are resolved against the canon so `"jean"` and `"Jean"` land
/// on the same key. Chapters must be in range and verses at least 1.
pub fn merge<I>(store: &dyn VerseStore, updates: I) -> MergeReport
where
    I: IntoIterator<Item = VerseUpdate>,
{
    let mut report = MergeReport::default();

    for (index, update) in updates.into_iter().enumerate() {
        let key = match key_for(&update) {
            Ok(key) => key,
            Err(error) => {
                report.rejected.push(RejectedUpdate { index, error });
                continue;
            }
        };

        match store.upsert(key, update.text) {
            Some(_) => report.updated += 1,
            None => report.inserted += 1,
        }
    }

    tracing::debug!(
        inserted = report.inserted,
        updated = report.updated,
        rejected = report.rejected.len(),
        "Merged verse updates"
    );
    report
}

fn key_for(update: &VerseUpdate) -> Result<VerseKey, String> {
    let book = resolve_book(&update.book).map_err(|e| e.to_string())?;
    if update.chapter < 1 || update.chapter > book.chapter_count {
        return Err(crate::Error::InvalidRange {
            field: "chapter",
            value: i64::from(update.chapter),
            max: book.chapter_count,
        }
        .to_string());
    }
    if update.verse < 1 || update.verse > crate::reference::MAX_VERSE {
        return Err(crate::Error::InvalidRange {
            field: "verse",
            value: i64::from(update.verse),
            max: crate::reference::MAX_VERSE,
        }
        .to_string());
    }
    Ok(VerseKey::new(book.name, update.chapter, update.verse))
}
