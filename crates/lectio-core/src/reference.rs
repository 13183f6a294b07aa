//! Book-name canonicalisation and chapter/verse validation.
//!
//! Free-text book names are folded into a normalisation key (diacritics
//! stripped, lowercased, whitespace and periods removed) and matched against
//! the canon: exact key first, then the first canonical name whose key starts
//! with the input.
//!
//! Chapter and verse numbers are validated strictly: anything outside
//! `1..=chapter_count` is rejected with [`Error::InvalidRange`].

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::canon::{CANON, CanonEntry};
use crate::error::{Error, Result};

/// Exact-match table: normalisation key -> canon entry.
static EXACT: LazyLock<HashMap<String, &'static CanonEntry>> = LazyLock::new(|| {
    CANON
        .iter()
        .map(|entry| (normalize_key(entry.name), entry))
        .collect()
});

/// Strip diacritics and lowercase, keeping word boundaries.
///
/// `"Ésaïe  Prophète"` becomes `"esaie  prophete"`.
pub fn fold(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Normalisation key used for book lookups.
///
/// Folds the input and drops whitespace and periods: `"1 Sam."` -> `"1sam"`.
pub fn normalize_key(input: &str) -> String {
    fold(input)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect()
}

/// Resolve a free-text book name to its canon entry.
pub fn resolve_book(input: &str) -> Result<&'static CanonEntry> {
    let key = normalize_key(input);
    if key.is_empty() {
        return Err(Error::BookNotFound(input.to_string()));
    }

    if let Some(entry) = EXACT.get(&key).copied() {
        return Ok(entry);
    }

    CANON
        .iter()
        .find(|entry| normalize_key(entry.name).starts_with(&key))
        .ok_or_else(|| Error::BookNotFound(input.trim().to_string()))
}

/// Clamp a chapter number into `1..=chapter_count`.
///
/// Client-side convenience only; request paths use [`Reference::new`].
pub fn clamp_chapter(book: &CanonEntry, chapter: i64) -> u32 {
    chapter.clamp(1, i64::from(book.chapter_count)) as u32
}

/// Longest chapter in the canon (Psaumes 119).
pub const MAX_VERSE: u32 = 176;

/// A single verse or an inclusive verse range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerseSpec {
    Single(u32),
    Range(u32, u32),
}

impl VerseSpec {
    /// Parse `"3"`, `"3-5"` or `"3–5"`. Empty input yields `None`.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let invalid = || Error::InvalidVerse(raw.to_string());
        let parse_num = |s: &str| -> Result<u32> {
            let n: i64 = s.trim().parse().map_err(|_| invalid())?;
            if !(1..=i64::from(MAX_VERSE)).contains(&n) {
                return Err(Error::InvalidRange {
                    field: "verse",
                    value: n,
                    max: MAX_VERSE,
                });
            }
            u32::try_from(n).map_err(|_| invalid())
        };

        match raw.split_once(['-', '–']) {
            Some((start, end)) => {
                let (start, end) = (parse_num(start)?, parse_num(end)?);
                if start > end {
                    return Err(invalid());
                }
                if start == end {
                    Ok(Some(Self::Single(start)))
                } else {
                    Ok(Some(Self::Range(start, end)))
                }
            }
            None => Ok(Some(Self::Single(parse_num(raw)?))),
        }
    }

    /// First verse covered.
    pub fn start(&self) -> u32 {
        match *self {
            Self::Single(v) | Self::Range(v, _) => v,
        }
    }

    /// Last verse covered.
    pub fn end(&self) -> u32 {
        match *self {
            Self::Single(v) | Self::Range(_, v) => v,
        }
    }

    /// Whether `verse` falls inside this spec.
    pub fn contains(&self, verse: u32) -> bool {
        (self.start()..=self.end()).contains(&verse)
    }
}

impl fmt::Display for VerseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(v) => write!(f, "{v}"),
            Self::Range(a, b) => write!(f, "{a}-{b}"),
        }
    }
}

/// A resolved passage reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub book: &'static CanonEntry,
    pub chapter: u32,
    pub verse: Option<VerseSpec>,
}

impl Reference {
    /// Build a reference from an already-resolved book, rejecting
    /// out-of-range chapters.
    pub fn new(book: &'static CanonEntry, chapter: i64, verse: Option<VerseSpec>) -> Result<Self> {
        if chapter < 1 || chapter > i64::from(book.chapter_count) {
            return Err(Error::InvalidRange {
                field: "chapter",
                value: chapter,
                max: book.chapter_count,
            });
        }
        Ok(Self {
            book,
            chapter: chapter as u32,
            verse,
        })
    }

    /// Resolve raw request parameters.
    ///
    /// `chapter` must be an integer; `verse` may be empty, `n` or `a-b`.
    pub fn parse(book: &str, chapter: &str, verse: &str) -> Result<Self> {
        let entry = resolve_book(book)?;
        let chapter_num: i64 = chapter
            .trim()
            .parse()
            .map_err(|_| Error::InvalidChapter(chapter.trim().to_string()))?;
        Self::new(entry, chapter_num, VerseSpec::parse(verse)?)
    }

    /// The documented default reference ("Genèse 1").
    pub fn default_study() -> Self {
        Self {
            book: &CANON[0],
            chapter: 1,
            verse: None,
        }
    }

    /// Human-readable reference, e.g. `Genèse 1:3-5`.
    pub fn display(&self) -> String {
        match self.verse {
            Some(v) => format!("{} {}:{}", self.book.name, self.chapter, v),
            None => format!("{} {}", self.book.name, self.chapter),
        }
    }

    /// OSIS-style identifier used as the provider passage id.
    ///
    /// `GEN.1`, `GEN.1.3`, `GEN.1.3-GEN.1.5`.
    pub fn osis_id(&self) -> String {
        self.osis_id_with(self.book.external_code)
    }

    /// Same as [`Reference::osis_id`] with a provider-specific book code.
    pub fn osis_id_with(&self, code: &str) -> String {
        match self.verse {
            None => format!("{code}.{}", self.chapter),
            Some(VerseSpec::Single(v)) => format!("{code}.{}.{v}", self.chapter),
            Some(VerseSpec::Range(a, b)) => {
                format!("{code}.{ch}.{a}-{code}.{ch}.{b}", ch = self.chapter)
            }
        }
    }

    /// Provider chapter id (`GEN.1`).
    pub fn chapter_id(&self) -> String {
        format!("{}.{}", self.book.external_code, self.chapter)
    }

    /// Verse string used when seeding (empty when no verse was given).
    pub fn verse_key(&self) -> String {
        self.verse.map(|v| v.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Parse a citation such as `"1 Corinthiens 15:3-4"` into a reference.
pub fn parse_citation(citation: &str) -> Result<Reference> {
    let citation = citation.trim();
    let (book, locus) = citation
        .rsplit_once(' ')
        .ok_or_else(|| Error::BookNotFound(citation.to_string()))?;
    let (chapter, verse) = locus.split_once(':').unwrap_or((locus, ""));
    Reference::parse(book, chapter, verse)
}
