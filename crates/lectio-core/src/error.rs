//! Error types for reference resolution and study composition.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while turning user input into a resolved reference.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The book name matched none of the 66 canon entries.
    #[error("book not found: '{0}'")]
    BookNotFound(String),

    /// A chapter or verse number falls outside its valid range.
    #[error("invalid {field}: {value} (expected 1..={max})")]
    InvalidRange {
        /// Which number was rejected ("chapter" or "verse").
        field: &'static str,
        /// The value supplied by the caller.
        value: i64,
        /// The largest accepted value.
        max: u32,
    },

    /// The chapter is not an integer.
    #[error("invalid chapter: '{0}' (expected a number)")]
    InvalidChapter(String),

    /// The verse specifier is neither `n` nor `a-b`.
    #[error("invalid verse specifier: '{0}'")]
    InvalidVerse(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BookNotFound(_) => "book_not_found",
            Self::InvalidRange { .. } | Self::InvalidChapter(_) | Self::InvalidVerse(_) => {
                "invalid_range"
            }
        }
    }
}
