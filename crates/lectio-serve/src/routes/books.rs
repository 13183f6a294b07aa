//! Canon listing endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use lectio_core::reference::resolve_book;
use lectio_core::{CANON, CanonEntry, Genre, Testament};
use serde::{Deserialize, Serialize};

use super::{Envelope, flag};
use crate::cache::{ListingKey, get_or_compute};
use crate::error::ApiError;
use crate::scripture::{ChapterVerseCount, UpstreamError};
use crate::state::AppState;

/// Query parameters for the canon listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooksQuery {
    /// `1` lists every book even when `book` is given.
    pub all: Option<String>,
    /// Single book to describe.
    pub book: Option<String>,
    /// `1` adds per-chapter verse counts from the provider.
    pub include_verses: Option<String>,
    /// "chapters" or "verses"; canonical order when absent.
    pub sort_by: Option<String>,
    /// "asc" (default) or "desc".
    pub order: Option<String>,
    /// Edition to count verses in (default: configured edition).
    pub bible_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChapterSummary {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verses: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub book: &'static str,
    pub code: &'static str,
    pub testament: Testament,
    pub genre: Genre,
    pub chapters_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verses_total: Option<u32>,
    pub chapters: Vec<ChapterSummary>,
    #[serde(skip)]
    position: usize,
}

impl BookSummary {
    fn new(entry: &'static CanonEntry) -> Self {
        Self {
            book: entry.name,
            code: entry.external_code,
            testament: entry.testament,
            genre: entry.genre,
            chapters_count: entry.chapter_count,
            verses_total: None,
            chapters: (1..=entry.chapter_count)
                .map(|number| ChapterSummary {
                    number,
                    verses: None,
                })
                .collect(),
            position: entry.position(),
        }
    }

    /// Fill verse counts; chapters the provider does not list stay empty.
    fn apply_counts(&mut self, counts: &[ChapterVerseCount]) {
        for chapter in &mut self.chapters {
            chapter.verses = counts
                .iter()
                .find(|c| c.number == chapter.number)
                .map(|c| c.verses);
        }
        self.verses_total = Some(self.chapters.iter().filter_map(|c| c.verses).sum());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Canon,
    Chapters,
    Verses,
}

impl SortKey {
    fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::Canon),
            Some("chapters") => Ok(Self::Chapters),
            Some("verses") => Ok(Self::Verses),
            Some(other) => Err(ApiError::BadRequest(format!(
                "invalid sortBy value: '{}'. Valid options: chapters, verses",
                other
            ))),
        }
    }
}

fn parse_descending(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("asc") => Ok(false),
        Some("desc") => Ok(true),
        Some(other) => Err(ApiError::BadRequest(format!(
            "invalid order value: '{}'. Valid options: asc, desc",
            other
        ))),
    }
}

/// `GET /books`
///
/// Lists canon books with chapter counts. With `includeVerses=1` every
/// chapter also carries its verse count from the provider; a provider
/// failure leaves counts empty and sets `warn`.
pub async fn list_books(
    State(state): State<AppState>,
    params: Result<Query<BooksQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<BookSummary>>>, ApiError> {
    let Query(params) = params?;
    // Validate before any provider call
    let sort = SortKey::parse(params.sort_by.as_deref())?;
    let descending = parse_descending(params.order.as_deref())?;

    let single = params
        .book
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty() && !flag(params.all.as_deref()));

    let entries: Vec<&'static CanonEntry> = match single {
        Some(name) => vec![resolve_book(name)?],
        None => CANON.iter().collect(),
    };

    let mut books: Vec<BookSummary> = entries.into_iter().map(BookSummary::new).collect();
    let mut warn = None;

    if flag(params.include_verses.as_deref()) {
        let bible_id = state.bible_id(params.bible_id.as_deref())?;
        warn = fill_verse_counts(&state, &bible_id, &mut books).await;
    }

    sort_books(&mut books, sort, descending);

    Ok(Json(Envelope::new(books).with_warn(warn)))
}

/// Fetch verse counts book by book. Books the edition lacks are skipped;
/// the first other failure stops further calls.
async fn fill_verse_counts(
    state: &AppState,
    bible_id: &str,
    books: &mut [BookSummary],
) -> Option<String> {
    let mut unmapped = Vec::new();

    for summary in books.iter_mut() {
        let entry = &CANON[summary.position];
        match verse_counts(state, bible_id, entry).await {
            Ok(counts) => summary.apply_counts(&counts),
            Err(UpstreamError::NoMapping(name)) => unmapped.push(name),
            Err(e) => {
                tracing::warn!(book = entry.name, error = %e, "verse counts unavailable");
                return Some(format!("verse counts unavailable: {e}"));
            }
        }
    }

    if unmapped.is_empty() {
        None
    } else {
        Some(format!("books missing from edition {bible_id}: {}", unmapped.join(", ")))
    }
}

async fn verse_counts(
    state: &AppState,
    bible_id: &str,
    entry: &CanonEntry,
) -> Result<Vec<ChapterVerseCount>, UpstreamError> {
    let book = state.provider_book(bible_id, entry).await?;
    let key = ListingKey::verse_counts(bible_id, &book.id);
    get_or_compute(&state.cache, &key, || {
        state.scripture.verse_counts(bible_id, &book.id)
    })
    .await
}

/// Stable sort, so ties keep canonical order.
fn sort_books(books: &mut [BookSummary], sort: SortKey, descending: bool) {
    let key = |b: &BookSummary| -> u64 {
        match sort {
            SortKey::Canon => b.position as u64,
            SortKey::Chapters => u64::from(b.chapters_count),
            SortKey::Verses => u64::from(b.verses_total.unwrap_or(0)),
        }
    };
    if descending {
        books.sort_by(|a, b| key(b).cmp(&key(a)));
    } else {
        books.sort_by_key(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn single_book_lists_its_chapters() {
        let state = state(config());
        let (status, body) = get(&state, "/books?book=psaumes").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        let books = body["data"].as_array().unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0]["book"], "Psaumes");
        assert_eq!(books[0]["chaptersCount"], 150);
        assert_eq!(books[0]["chapters"].as_array().unwrap().len(), 150);
        assert!(books[0].get("versesTotal").is_none());
    }

    #[tokio::test]
    async fn all_books_sorted_by_chapters_desc() {
        let state = state(config());
        let (status, body) = get(&state, "/books?all=1&sortBy=chapters&order=desc").await;
        assert_eq!(status, StatusCode::OK);
        let books = body["data"].as_array().unwrap();
        assert_eq!(books.len(), 66);
        assert_eq!(books[0]["book"], "Psaumes");
        // Ties keep canonical order: Abdias precedes Philémon, 2 Jean, 3 Jean, Jude.
        let tail: Vec<_> = books[61..].iter().map(|b| b["book"].as_str().unwrap()).collect();
        assert_eq!(tail, vec!["Abdias", "Philémon", "2 Jean", "3 Jean", "Jude"]);
    }

    #[tokio::test]
    async fn default_is_canonical_order() {
        let state = state(config());
        let (_, body) = get(&state, "/books").await;
        let books = body["data"].as_array().unwrap();
        assert_eq!(books[0]["book"], "Genèse");
        assert_eq!(books[65]["book"], "Apocalypse");
        assert_eq!(books[0]["testament"], "AT");
    }

    #[tokio::test]
    async fn unknown_book_is_404_envelope() {
        let state = state(config());
        let (status, body) = get(&state, "/books?book=xyzzy").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "book_not_found");
    }

    #[tokio::test]
    async fn invalid_sort_is_400() {
        let state = state(config());
        let (status, body) = get(&state, "/books?sortBy=pages").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn include_verses_requires_provider() {
        let state = state(config());
        let (status, body) = get(&state, "/books?book=Jude&includeVerses=1").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "configuration_missing");
    }

    #[tokio::test]
    async fn include_verses_counts_from_provider() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "JUD", "name": "Jude", "abbreviation": "Jd"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books/JUD/chapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"number": "intro"}, {"number": "1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/chapters/JUD.1/verses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": (1..=25).map(|n| json!({"id": format!("JUD.1.{n}")})).collect::<Vec<_>>()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let state = state(mocked_config(&server.uri()));
        let (status, body) = get(&state, "/books?book=Jude&includeVerses=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["versesTotal"], 25);
        assert_eq!(body["data"][0]["chapters"][0]["verses"], 25);
        assert!(body.get("warn").is_none());

        // Second call is served from cache (mocks expect exactly one hit).
        let (_, again) = get(&state, "/books?book=Jude&includeVerses=1").await;
        assert_eq!(again["data"][0]["versesTotal"], 25);
    }

    #[tokio::test]
    async fn unmapped_books_degrade_with_warning() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "MAT", "name": "Matthieu"}]
            })))
            .mount(&server)
            .await;

        let state = state(mocked_config(&server.uri()));
        let (status, body) = get(&state, "/books?book=Jude&includeVerses=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["warn"].as_str().unwrap().contains("Jude"));
        assert!(body["data"][0].get("versesTotal").is_none());
    }

    #[test]
    fn apply_counts_sums_known_chapters() {
        let mut summary = BookSummary::new(lectio_core::canon::by_name("Ruth").unwrap());
        summary.apply_counts(&[
            ChapterVerseCount { number: 1, verses: 22 },
            ChapterVerseCount { number: 3, verses: 18 },
        ]);
        assert_eq!(summary.verses_total, Some(40));
        assert_eq!(summary.chapters[1].verses, None);
    }
}
