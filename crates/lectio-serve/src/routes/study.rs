//! Study generation endpoints.
//!
//! Both handlers always answer 200. Failures are reported in the envelope
//! (`ok: false`), never through the status code.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use lectio_core::{Reference, Study, motif};
use serde::Deserialize;

use super::{Envelope, parse_reference};
use crate::error::ApiError;
use crate::metrics::{record_llm_fallback, record_study};
use crate::state::AppState;

/// A chapter or verse sent either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Locus {
    Number(i64),
    Text(String),
}

impl Locus {
    fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudyRequest {
    pub book: String,
    pub chapter: Locus,
    #[serde(default)]
    pub verse: Option<Locus>,
    /// Version code used in citation links.
    #[serde(default)]
    pub version: Option<String>,
    /// Free-form guidance forwarded to the LLM.
    #[serde(default)]
    pub directives: Option<String>,
}

/// `POST /study`
///
/// `source` is `openai+fallback` when motifs came from the LLM and
/// `canonical` when the local heuristic was used; `warn` explains a failed
/// LLM call.
pub async fn create_study(
    State(state): State<AppState>,
    payload: Result<Json<StudyRequest>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(request)) => study(&state, request).await,
        Err(rejection) => Err(rejection.into()),
    };

    match result {
        Ok(envelope) => Json(envelope).into_response(),
        Err(err) => Json(err.envelope()).into_response(),
    }
}

async fn study(state: &AppState, request: StudyRequest) -> Result<Envelope<Study>, ApiError> {
    let verse = request.verse.as_ref().map(Locus::as_text);
    let reference = parse_reference(
        Some(&request.book),
        Some(&request.chapter.as_text()),
        verse.as_deref(),
    )?;

    let version = request
        .version
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| state.config.default_version.clone());

    let (motifs, source, warn) = match &state.llm {
        Some(llm) => match llm.motifs(&reference, request.directives.as_deref()).await {
            Ok(motifs) => (motifs, "openai+fallback", None),
            Err(e) => {
                tracing::warn!(
                    reference = %reference,
                    model = llm.model(),
                    error = %e,
                    "LLM motifs unavailable, using local heuristic"
                );
                record_llm_fallback();
                (motif::heuristic(&reference), "canonical", Some(format!("LLM indisponible: {e}")))
            }
        },
        None => (motif::heuristic(&reference), "canonical", None),
    };

    let study = lectio_core::compose(&reference, &motifs, &version, state.config.link_style);

    record_study(source);
    tracing::info!(reference = %reference, version = %version, source, "study generated");

    Ok(Envelope::new(study).with_source(source).with_warn(warn))
}

/// `GET /study`
///
/// Probe: composes the default study with local motifs and no provider call.
pub async fn probe(State(state): State<AppState>) -> Json<Envelope<Study>> {
    let reference = Reference::default_study();
    let motifs = motif::heuristic(&reference);
    let study = lectio_core::compose(
        &reference,
        &motifs,
        &state.config.default_version,
        state.config.link_style,
    );
    record_study("probe");
    Json(Envelope::new(study).with_source("probe"))
}
