//! Passage text endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use lectio_core::segment::clean_text;
use lectio_core::{Reference, VerseRecord, segment};
use serde::{Deserialize, Serialize};

use super::{Envelope, parse_reference};
use crate::error::ApiError;
use crate::scripture::UpstreamError;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageQuery {
    pub book: Option<String>,
    pub chapter: Option<String>,
    /// `n` or `a-b`; the whole chapter when absent.
    pub verse: Option<String>,
    pub bible_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub reference: String,
    pub osis_id: String,
    pub bible_id: String,
    pub passage_text: String,
    pub verses: Vec<VerseRecord>,
}

/// `GET /passage`
///
/// Bad references and missing configuration use conventional statuses. A
/// provider failure answers 200 with empty text, `source: "fallback"` and
/// the reason in `warn`.
pub async fn get_passage(
    State(state): State<AppState>,
    params: Result<Query<PassageQuery>, QueryRejection>,
) -> Result<Json<Envelope<Passage>>, ApiError> {
    let Query(params) = params?;
    let reference = parse_reference(
        params.book.as_deref(),
        params.chapter.as_deref(),
        params.verse.as_deref(),
    )?;
    let bible_id = state.bible_id(params.bible_id.as_deref())?;

    let (raw, source, warn) = match fetch(&state, &bible_id, &reference).await {
        Ok((raw, source)) => (raw, source, None),
        Err(e) => {
            tracing::warn!(reference = %reference, error = %e, "passage unavailable, using fallback");
            (String::new(), "fallback", Some(e.to_string()))
        }
    };

    let verses = if raw.trim().is_empty() {
        Vec::new()
    } else {
        segment(&raw)
    };

    let passage = Passage {
        reference: reference.display(),
        osis_id: reference.osis_id(),
        bible_id,
        passage_text: clean_text(&raw),
        verses,
    };

    Ok(Json(Envelope::new(passage).with_source(source).with_warn(warn)))
}

async fn fetch(
    state: &AppState,
    bible_id: &str,
    reference: &Reference,
) -> Result<(String, &'static str), UpstreamError> {
    let book = state.provider_book(bible_id, reference.book).await?;
    if reference.verse.is_some() {
        let text = state
            .scripture
            .passage(bible_id, &reference.osis_id_with(&book.id))
            .await?;
        Ok((text, "api.passage"))
    } else {
        let chapter_id = format!("{}.{}", book.id, reference.chapter);
        let text = state.scripture.chapter_text(bible_id, &chapter_id).await?;
        Ok((text, "api.chapter"))
    }
}
