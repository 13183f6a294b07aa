//! Verse listing and bulk override endpoints.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use lectio_core::compose::citation_links;
use lectio_core::reference::MAX_VERSE;
use lectio_core::store::{self, MergeReport, VerseUpdate};
use lectio_core::{Reference, VerseRecord, segment};
use serde::{Deserialize, Serialize};

use super::{Envelope, parse_reference};
use crate::error::ApiError;
use crate::metrics::record_verses;
use crate::state::AppState;

/// Verses generated when no provider text is available.
const DEFAULT_COUNT: u32 = 31;

/// Largest accepted bulk update.
const MAX_BULK_UPDATES: usize = 5000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersesQuery {
    pub book: Option<String>,
    pub chapter: Option<String>,
    /// Size of the generated fallback (default 31).
    pub count: Option<String>,
    pub bible_id: Option<String>,
    /// Version code for verse links (default: configured version).
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseItem {
    pub v: u32,
    pub text: String,
    #[serde(rename = "noteHTML")]
    pub note_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersesData {
    pub reference: String,
    pub verses: Vec<VerseItem>,
    /// Verses whose text came from the override store.
    pub overrides: usize,
}

/// `GET /verses`
///
/// Always answers 200. Sources, in order of preference: `api.verses`
/// (verse-by-verse), `api.chapter` (segmented chapter text), then generated
/// placeholders: `fallback-generated` when the provider is not configured,
/// `fallback` when it failed. Store overrides are applied last.
pub async fn list_verses(
    State(state): State<AppState>,
    params: Result<Query<VersesQuery>, QueryRejection>,
) -> Response {
    let result = match params {
        Ok(Query(params)) => verses(&state, &params).await,
        Err(rejection) => Err(rejection.into()),
    };

    match result {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => Json(err.envelope()).into_response(),
    }
}

async fn verses(state: &AppState, params: &VersesQuery) -> Result<Envelope<VersesData>, ApiError> {
    let reference = parse_reference(params.book.as_deref(), params.chapter.as_deref(), None)?;
    let count = parse_count(params.count.as_deref())?;
    let version = params
        .version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| state.config.default_version.clone());

    let (mut records, source, warn) = fetch(state, params.bible_id.as_deref(), &reference, count).await;

    let overrides = state.store.chapter(reference.book.name, reference.chapter);
    let applied = apply_overrides(&mut records, overrides);

    record_verses(source);
    tracing::debug!(
        reference = %reference,
        source,
        verses = records.len(),
        overrides = applied,
        "verses served"
    );

    let verses = records
        .into_iter()
        .map(|r| {
            let citation = format!("{} {}:{}", reference.book.name, reference.chapter, r.number);
            let note_html = if r.number == 0 {
                String::new()
            } else {
                citation_links(&[citation.as_str()], &version, state.config.link_style).into_string()
            };
            VerseItem {
                v: r.number,
                text: r.text,
                note_html,
            }
        })
        .collect();

    Ok(Envelope::new(VersesData {
        reference: reference.display(),
        verses,
        overrides: applied,
    })
    .with_source(source)
    .with_warn(warn))
}

/// Walk the source chain; never fails.
async fn fetch(
    state: &AppState,
    requested_bible: Option<&str>,
    reference: &Reference,
    count: u32,
) -> (Vec<VerseRecord>, &'static str, Option<String>) {
    let bible_id = match state.bible_id(requested_bible) {
        Ok(id) => id,
        Err(e) => return (generated(reference, count), "fallback-generated", Some(e.to_string())),
    };

    let book = match state.provider_book(&bible_id, reference.book).await {
        Ok(book) => book,
        Err(e) => return (generated(reference, count), "fallback", Some(e.to_string())),
    };
    let chapter_id = format!("{}.{}", book.id, reference.chapter);

    match state.scripture.chapter_verses(&bible_id, &chapter_id).await {
        Ok(verses) if !verses.is_empty() => return (verses, "api.verses", None),
        Ok(_) => tracing::debug!(chapter = %chapter_id, "provider listed no verses"),
        Err(e) => tracing::warn!(chapter = %chapter_id, error = %e, "verse listing failed, trying chapter text"),
    }

    match state.scripture.chapter_text(&bible_id, &chapter_id).await {
        Ok(text) if !text.trim().is_empty() => (numbered_only(segment(&text)), "api.chapter", None),
        Ok(_) => (
            generated(reference, count),
            "fallback",
            Some(format!("provider returned no text for {chapter_id}")),
        ),
        Err(e) => (generated(reference, count), "fallback", Some(e.to_string())),
    }
}

/// Drop the unnumbered lead-in when the text did segment.
fn numbered_only(records: Vec<VerseRecord>) -> Vec<VerseRecord> {
    if records.iter().any(|r| r.number > 0) {
        records.into_iter().filter(|r| r.number > 0).collect()
    } else {
        records
    }
}

fn generated(reference: &Reference, count: u32) -> Vec<VerseRecord> {
    (1..=count)
        .map(|n| {
            VerseRecord::new(
                n,
                format!("{} {}:{} (texte indisponible)", reference.book.name, reference.chapter, n),
            )
        })
        .collect()
}

fn parse_count(raw: Option<&str>) -> Result<u32, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_COUNT);
    };
    match raw.parse::<i64>() {
        Ok(n) if (1..=i64::from(MAX_VERSE)).contains(&n) => Ok(n as u32),
        _ => Err(ApiError::InvalidRange(format!(
            "invalid count: {raw} (expected 1..={MAX_VERSE})"
        ))),
    }
}

/// Replace or insert overridden verses; keeps numbers sorted and unique.
fn apply_overrides(records: &mut Vec<VerseRecord>, overrides: Vec<VerseRecord>) -> usize {
    let applied = overrides.len();
    for o in overrides {
        match records.iter_mut().find(|r| r.number == o.number) {
            Some(existing) => existing.text = o.text,
            None => records.push(o),
        }
    }
    records.sort_by_key(|r| r.number);
    applied
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub updates: Vec<VerseUpdate>,
}

/// `POST /verses/bulk`
///
/// Merges updates into the verse store, last write wins. Entries that do
/// not resolve are reported in `rejected` and skipped.
pub async fn bulk_upsert(
    State(state): State<AppState>,
    payload: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<Envelope<MergeReport>>, ApiError> {
    let Json(request) = payload?;
    if request.updates.is_empty() {
        return Err(ApiError::BadRequest("updates must not be empty".to_string()));
    }
    if request.updates.len() > MAX_BULK_UPDATES {
        return Err(ApiError::BadRequest(format!(
            "too many updates: {} (max {MAX_BULK_UPDATES})",
            request.updates.len()
        )));
    }

    let report = store::merge(state.store.as_ref(), request.updates);
    tracing::info!(
        inserted = report.inserted,
        updated = report.updated,
        rejected = report.rejected.len(),
        stored = state.store.len(),
        "verse overrides merged"
    );

    Ok(Json(Envelope::new(report)))
}
