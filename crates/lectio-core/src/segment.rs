//! Verse segmentation for rendered chapter/passage text.
//!
//! The provider returns a whole chapter as one text blob with inline verse
//! markers. Two marker styles are recognised:
//!
//! - bracketed numbers: `[1] Au commencement [2] La terre était`
//! - leading digit runs: `1. Au commencement 2 La terre était`
//!
//! Text with neither style becomes a single record numbered `0`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single verse of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseRecord {
    /// Verse number; `0` means "whole block, unsegmented".
    pub number: u32,
    pub text: String,
}

impl VerseRecord {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

static BRACKET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]\s*").expect("bracket marker regex should compile"));

static NUMERIC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(\d{1,3})[.:)]?\s+").expect("numeric marker regex should compile")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("html tag regex should compile"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,.;:!?])").expect("punctuation regex should compile"));

/// Strip tags, decode common entities, collapse whitespace, tighten punctuation.
pub fn clean_text(raw: &str) -> String {
    let stripped = HTML_TAG.replace_all(raw, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    let collapsed = WHITESPACE.replace_all(&decoded, " ");
    SPACE_BEFORE_PUNCT
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}

/// Split a text blob into ordered verse records.
///
/// The result is sorted by verse number (stable) and records sharing a
/// number are coalesced, so numbers are unique and increasing.
pub fn segment(raw: &str) -> Vec<VerseRecord> {
    let records = split_on_brackets(raw)
        .or_else(|| split_on_numbers(&clean_text(raw)))
        .unwrap_or_else(|| vec![VerseRecord::new(0, clean_text(raw))]);

    normalize_order(records)
}

/// Primary split on `[n]` markers.
fn split_on_brackets(raw: &str) -> Option<Vec<VerseRecord>> {
    let markers: Vec<_> = BRACKET_MARKER.captures_iter(raw).collect();
    if markers.is_empty() {
        return None;
    }

    let mut records = Vec::with_capacity(markers.len() + 1);

    let first = markers[0].get(0)?;
    let lead = clean_text(&raw[..first.start()]);
    if !lead.is_empty() {
        records.push(VerseRecord::new(0, lead));
    }

    for (i, caps) in markers.iter().enumerate() {
        let whole = caps.get(0)?;
        let number: u32 = caps[1].parse().ok()?;
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(raw.len(), |m| m.start());
        records.push(VerseRecord::new(number, clean_text(&raw[whole.end()..end])));
    }

    Some(records)
}

/// Secondary split on leading digit runs. Only applies when the cleaned text
/// itself starts with a verse number.
fn split_on_numbers(cleaned: &str) -> Option<Vec<VerseRecord>> {
    let markers: Vec<_> = NUMERIC_MARKER.captures_iter(cleaned).collect();
    let first = markers.first()?.get(0)?;
    if first.start() != 0 {
        return None;
    }

    let mut records = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let whole = caps.get(0)?;
        let number: u32 = caps[1].parse().ok()?;
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(cleaned.len(), |m| m.start());
        let text = clean_text(&cleaned[whole.end()..end]);
        if !text.is_empty() {
            records.push(VerseRecord::new(number, text));
        }
    }

    if records.is_empty() { None } else { Some(records) }
}

/// Stable sort by number, then coalesce duplicates.
fn normalize_order(mut records: Vec<VerseRecord>) -> Vec<VerseRecord> {
    records.sort_by_key(|r| r.number);

    let mut out: Vec<VerseRecord> = Vec::with_capacity(records.len());
    for record in records {
        match out.last_mut() {
            Some(last) if last.number == record.number => {
                if !record.text.is_empty() {
                    if !last.text.is_empty() {
                        last.text.push(' ');
                    }
                    last.text.push_str(&record.text);
                }
            }
            _ => out.push(record),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_markers_split_into_verses() {
        let verses = segment("[1] In the beginning [2] the earth was");
        assert_eq!(
            verses,
            vec![
                VerseRecord::new(1, "In the beginning"),
                VerseRecord::new(2, "the earth was"),
            ]
        );
    }

    #[test]
    fn plain_text_is_a_single_unsegmented_block() {
        let verses = segment("just a plain sentence");
        assert_eq!(verses, vec![VerseRecord::new(0, "just a plain sentence")]);
    }

    #[test]
    fn empty_text_yields_single_empty_block() {
        assert_eq!(segment("   "), vec![VerseRecord::new(0, "")]);
    }

    #[test]
    fn numeric_prefix_fallback() {
        let verses = segment("1. Au commencement, Dieu créa. 2 La terre était informe.");
        assert_eq!(
            verses,
            vec![
                VerseRecord::new(1, "Au commencement, Dieu créa."),
                VerseRecord::new(2, "La terre était informe."),
            ]
        );
    }

    #[test]
    fn numbers_inside_prose_do_not_segment() {
        let verses = segment("Il avait 12 ans quand il partit.");
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].number, 0);
    }

    #[test]
    fn html_is_stripped_and_punctuation_tightened() {
        let raw = r#"<p class="p"><span data-number="1" class="v">[1]</span> Au   commencement ,&nbsp;Dieu créa les cieux et la terre .</p>"#;
        let verses = segment(raw);
        assert_eq!(
            verses,
            vec![VerseRecord::new(1, "Au commencement, Dieu créa les cieux et la terre.")]
        );
    }

    #[test]
    fn output_is_sorted_and_unique() {
        let verses = segment("[3] trois [1] un [2] deux [1] encore");
        let numbers: Vec<_> = verses.iter().map(|v| v.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(verses[0].text, "un encore");
    }

    #[test]
    fn leading_text_before_first_marker_is_kept() {
        let verses = segment("Chapitre 1 [1] Au commencement");
        assert_eq!(verses[0], VerseRecord::new(0, "Chapitre 1"));
        assert_eq!(verses[1], VerseRecord::new(1, "Au commencement"));
    }

    #[test]
    fn clean_text_decodes_entities() {
        assert_eq!(clean_text("a &amp; b &quot;c&quot;"), "a & b \"c\"");
        assert_eq!(clean_text("  x  \n\t y "), "x y");
    }
}
