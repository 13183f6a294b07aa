//! Core types and pure logic for the lectio Bible study service.
//!
//! This crate provides:
//! - The 66-book French canon with testament and genre metadata
//! - Reference normalization (book names, chapters, verse ranges)
//! - Verse segmentation for rendered chapter text
//! - Motif heuristics, seeded cross-reference selection and link building
//! - The 28-section study composer
//! - An injectable verse override store
//!
//! Nothing here performs I/O; the HTTP service lives in `lectio-serve`.

pub mod canon;
pub mod compose;
mod error;
pub mod motif;
pub mod reference;
pub mod segment;
pub mod select;
pub mod store;

pub use canon::{CANON, CanonEntry, Genre, Testament};
pub use compose::{SECTION_COUNT, Study, StudySection, compose};
pub use error::{Error, Result};
pub use motif::MotifSet;
pub use reference::{Reference, VerseSpec};
pub use segment::{VerseRecord, segment};
pub use select::LinkStyle;
pub use store::{InMemoryVerseStore, MergeReport, VerseKey, VerseStore, VerseUpdate};
