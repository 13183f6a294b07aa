//! The fixed 66-book canon.
//!
//! Book names are the French (Louis Segond) canonical names. External codes
//! are the USFM book codes used by the scripture provider.

use serde::Serialize;

/// Old or New Testament.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Testament {
    /// Ancien Testament.
    #[serde(rename = "AT")]
    Old,
    /// Nouveau Testament.
    #[serde(rename = "NT")]
    New,
}

impl Testament {
    /// Short code ("AT" / "NT").
    pub fn code(self) -> &'static str {
        match self {
            Self::Old => "AT",
            Self::New => "NT",
        }
    }
}

/// Literary genre of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Genre {
    #[serde(rename = "narratif")]
    Narrative,
    #[serde(rename = "poétique")]
    Poetic,
    #[serde(rename = "prophétique")]
    Prophetic,
    #[serde(rename = "épistolaire")]
    Epistolary,
}

impl Genre {
    /// French label used in generated prose.
    pub fn label(self) -> &'static str {
        match self {
            Self::Narrative => "narratif",
            Self::Poetic => "poétique",
            Self::Prophetic => "prophétique",
            Self::Epistolary => "épistolaire",
        }
    }
}

/// One book of the canon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonEntry {
    /// Canonical French name.
    pub name: &'static str,
    /// Number of chapters.
    pub chapter_count: u32,
    /// USFM code used by the scripture provider.
    pub external_code: &'static str,
    pub testament: Testament,
    pub genre: Genre,
}

impl CanonEntry {
    /// Zero-based position in canonical order.
    pub fn position(&self) -> usize {
        CANON
            .iter()
            .position(|e| e.external_code == self.external_code)
            .unwrap_or(0)
    }
}

const fn book(
    name: &'static str,
    chapter_count: u32,
    external_code: &'static str,
    testament: Testament,
    genre: Genre,
) -> CanonEntry {
    CanonEntry {
        name,
        chapter_count,
        external_code,
        testament,
        genre,
    }
}

use Genre::{Epistolary, Narrative, Poetic, Prophetic};
use Testament::{New, Old};

/// All 66 books in canonical order (AT then NT).
pub static CANON: [CanonEntry; 66] = [
    book("Genèse", 50, "GEN", Old, Narrative),
    book("Exode", 40, "EXO", Old, Narrative),
    book("Lévitique", 27, "LEV", Old, Narrative),
    book("Nombres", 36, "NUM", Old, Narrative),
    book("Deutéronome", 34, "DEU", Old, Narrative),
    book("Josué", 24, "JOS", Old, Narrative),
    book("Juges", 21, "JDG", Old, Narrative),
    book("Ruth", 4, "RUT", Old, Narrative),
    book("1 Samuel", 31, "1SA", Old, Narrative),
    book("2 Samuel", 24, "2SA", Old, Narrative),
    book("1 Rois", 22, "1KI", Old, Narrative),
    book("2 Rois", 25, "2KI", Old, Narrative),
    book("1 Chroniques", 29, "1CH", Old, Narrative),
    book("2 Chroniques", 36, "2CH", Old, Narrative),
    book("Esdras", 10, "EZR", Old, Narrative),
    book("Néhémie", 13, "NEH", Old, Narrative),
    book("Esther", 10, "EST", Old, Narrative),
    book("Job", 42, "JOB", Old, Poetic),
    book("Psaumes", 150, "PSA", Old, Poetic),
    book("Proverbes", 31, "PRO", Old, Poetic),
    book("Ecclésiaste", 12, "ECC", Old, Poetic),
    book("Cantique des Cantiques", 8, "SNG", Old, Poetic),
    book("Ésaïe", 66, "ISA", Old, Prophetic),
    book("Jérémie", 52, "JER", Old, Prophetic),
    book("Lamentations", 5, "LAM", Old, Poetic),
    book("Ézéchiel", 48, "EZK", Old, Prophetic),
    book("Daniel", 12, "DAN", Old, Prophetic),
    book("Osée", 14, "HOS", Old, Prophetic),
    book("Joël", 3, "JOL", Old, Prophetic),
    book("Amos", 9, "AMO", Old, Prophetic),
    book("Abdias", 1, "OBA", Old, Prophetic),
    book("Jonas", 4, "JON", Old, Prophetic),
    book("Michée", 7, "MIC", Old, Prophetic),
    book("Nahum", 3, "NAM", Old, Prophetic),
    book("Habacuc", 3, "HAB", Old, Prophetic),
    book("Sophonie", 3, "ZEP", Old, Prophetic),
    book("Aggée", 2, "HAG", Old, Prophetic),
    book("Zacharie", 14, "ZEC", Old, Prophetic),
    book("Malachie", 4, "MAL", Old, Prophetic),
    book("Matthieu", 28, "MAT", New, Narrative),
    book("Marc", 16, "MRK", New, Narrative),
    book("Luc", 24, "LUK", New, Narrative),
    book("Jean", 21, "JHN", New, Narrative),
    book("Actes", 28, "ACT", New, Narrative),
    book("Romains", 16, "ROM", New, Epistolary),
    book("1 Corinthiens", 16, "1CO", New, Epistolary),
    book("2 Corinthiens", 13, "2CO", New, Epistolary),
    book("Galates", 6, "GAL", New, Epistolary),
    book("Éphésiens", 6, "EPH", New, Epistolary),
    book("Philippiens", 4, "PHP", New, Epistolary),
    book("Colossiens", 4, "COL", New, Epistolary),
    book("1 Thessaloniciens", 5, "1TH", New, Epistolary),
    book("2 Thessaloniciens", 3, "2TH", New, Epistolary),
    book("1 Timothée", 6, "1TI", New, Epistolary),
    book("2 Timothée", 4, "2TI", New, Epistolary),
    book("Tite", 3, "TIT", New, Epistolary),
    book("Philémon", 1, "PHM", New, Epistolary),
    book("Hébreux", 13, "HEB", New, Epistolary),
    book("Jacques", 5, "JAS", New, Epistolary),
    book("1 Pierre", 5, "1PE", New, Epistolary),
    book("2 Pierre", 3, "2PE", New, Epistolary),
    book("1 Jean", 5, "1JN", New, Epistolary),
    book("2 Jean", 1, "2JN", New, Epistolary),
    book("3 Jean", 1, "3JN", New, Epistolary),
    book("Jude", 1, "JUD", New, Epistolary),
    book("Apocalypse", 22, "REV", New, Prophetic),
];

/// Look up a book by its exact canonical name.
pub fn by_name(name: &str) -> Option<&'static CanonEntry> {
    CANON.iter().find(|e| e.name == name)
}

/// Look up a book by its USFM code (case-insensitive).
pub fn by_code(code: &str) -> Option<&'static CanonEntry> {
    CANON
        .iter()
        .find(|e| e.external_code.eq_ignore_ascii_case(code))
}

/// Chapter count for an exact canonical name.
pub fn chapter_count(name: &str) -> Option<u32> {
    by_name(name).map(|e| e.chapter_count)
}
