//! API route definitions.

mod bibles;
mod books;
mod health;
mod passage;
mod study;
mod verses;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use lectio_core::Reference;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the complete API router.
///
/// # Route Structure
///
/// ## Listings (conventional status codes, cache headers)
/// - `GET /books` - Canon listing, optionally with provider verse counts
/// - `GET /bibles` - Provider edition catalogue
///
/// ## Content
/// - `GET /health` - Health check
/// - `GET /passage` - Rendered passage text
/// - `GET /verses` - Verses of a chapter (always 200)
/// - `POST /verses/bulk` - Merge verse overrides into the store
/// - `POST /study` - 28-section study (always 200)
/// - `GET /study` - Probe study for the default reference
pub fn router(state: AppState) -> Router {
    let listings = Router::new()
        .route("/books", get(books::list_books))
        .route("/bibles", get(bibles::list_bibles))
        .layer(middleware::map_response(add_cache_headers));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/passage", get(passage::get_passage))
        .route("/verses", get(verses::list_verses))
        .route("/verses/bulk", post(verses::bulk_upsert))
        .route("/study", get(study::probe).post(study::create_study))
        .merge(listings)
        .with_state(state)
}

/// Successful response body.
///
/// `source` names where the content came from and `warn` explains a
/// degraded answer; both are omitted when not applicable.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warn: Option<String>,
    data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            ok: true,
            source: None,
            warn: None,
            data,
        }
    }

    pub fn with_source(mut self, source: &'static str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_warn(mut self, warn: Option<String>) -> Self {
        self.warn = warn;
        self
    }
}

/// Resolve `book`, `chapter` and `verse` request parameters.
fn parse_reference(
    book: Option<&str>,
    chapter: Option<&str>,
    verse: Option<&str>,
) -> Result<Reference, ApiError> {
    let book = book
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'book' parameter".to_string()))?;
    let chapter = chapter
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing 'chapter' parameter".to_string()))?;
    Ok(Reference::parse(book, chapter, verse.unwrap_or(""))?)
}

/// Parse a boolean-ish flag (`1`, `true`, `yes`).
fn flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Add cache headers to listing responses.
///
/// Listings only change when the provider catalogue does.
async fn add_cache_headers(response: Response) -> Response {
    if response.status().is_success() {
        let (mut parts, body) = response.into_parts();
        parts.headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=300, stale-while-revalidate=600"),
        );
        Response::from_parts(parts, body)
    } else {
        response
    }
}
