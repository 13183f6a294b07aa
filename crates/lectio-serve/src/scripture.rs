//! Client for the scripture content provider.
//!
//! The provider exposes editions ("bibles"), their books, chapters and
//! verses under `/bibles/{bibleId}/...`, every payload wrapped in a `data`
//! field and every call authenticated with an `api-key` header. Responses
//! are narrowed to typed structs at this boundary; anything else becomes
//! [`UpstreamError::Malformed`].
//!
//! No method panics and every call carries the configured timeout.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use lectio_core::canon;
use lectio_core::reference::normalize_key;
use lectio_core::segment::clean_text;
use lectio_core::{CanonEntry, VerseRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::metrics::record_upstream;

const PROVIDER: &str = "scripture";

/// Maximum number of concurrent per-item calls.
pub const BATCH_SIZE: usize = 10;

/// Longest upstream error body kept in messages.
const MAX_ERROR_BODY: usize = 200;

/// Failure of one provider call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("provider credential not configured")]
    NotConfigured,

    #[error("provider unavailable (status {status:?}): {message}")]
    Unavailable { status: Option<u16>, message: String },

    #[error("provider timed out")]
    Timeout,

    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The edition has no book matching the canonical name.
    #[error("no provider book matches '{0}'")]
    NoMapping(String),
}

impl UpstreamError {
    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Unavailable { .. } => "unavailable",
            Self::Timeout => "timeout",
            Self::Malformed(_) => "malformed",
            Self::NoMapping(_) => "no_mapping",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

/// A book as listed by one edition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
}

#[derive(Debug, Deserialize)]
struct ChapterItem {
    number: String,
}

#[derive(Debug, Deserialize)]
struct VerseItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    content: String,
}

/// Verse count of one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterVerseCount {
    pub number: u32,
    pub verses: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibleLanguage {
    pub id: String,
    pub name: String,
}

/// One edition from the provider catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibleSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub abbreviation: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<BibleLanguage>,
}

/// Scripture provider HTTP client.
#[derive(Clone)]
pub struct ScriptureClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ScriptureClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid scripture provider URL '{base_url}': {e}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("scripture provider URL '{base_url}' cannot be a base");
        }
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Whether a credential is available.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Books of one edition, in provider order.
    pub async fn list_books(&self, bible_id: &str) -> Result<Vec<ProviderBook>, UpstreamError> {
        self.get_json(&["bibles", bible_id, "books"], &[]).await
    }

    /// Numbered chapters of one book, ascending. Intro chapters are skipped.
    pub async fn list_chapters(
        &self,
        bible_id: &str,
        book_id: &str,
    ) -> Result<Vec<u32>, UpstreamError> {
        let items: Vec<ChapterItem> = self
            .get_json(&["bibles", bible_id, "books", book_id, "chapters"], &[])
            .await?;
        let mut numbers: Vec<u32> = items.iter().filter_map(|c| c.number.parse().ok()).collect();
        numbers.sort_unstable();
        numbers.dedup();
        Ok(numbers)
    }

    /// Verse ids of one chapter with their verse numbers.
    pub async fn verse_ids(
        &self,
        bible_id: &str,
        chapter_id: &str,
    ) -> Result<Vec<(u32, String)>, UpstreamError> {
        let items: Vec<VerseItem> = self
            .get_json(&["bibles", bible_id, "chapters", chapter_id, "verses"], &[])
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|v| {
                let number = v.id.rsplit('.').next()?.parse().ok()?;
                Some((number, v.id))
            })
            .collect())
    }

    /// Plain text of one verse.
    pub async fn verse_text(&self, bible_id: &str, verse_id: &str) -> Result<String, UpstreamError> {
        let item: ContentItem = self
            .get_json(
                &["bibles", bible_id, "verses", verse_id],
                &[
                    ("content-type", "text"),
                    ("include-verse-numbers", "false"),
                    ("include-titles", "false"),
                ],
            )
            .await?;
        Ok(clean_text(&item.content))
    }

    /// Rendered text of a whole chapter with `[n]` verse markers.
    pub async fn chapter_text(
        &self,
        bible_id: &str,
        chapter_id: &str,
    ) -> Result<String, UpstreamError> {
        self.content(&["bibles", bible_id, "chapters", chapter_id]).await
    }

    /// Rendered text of an OSIS-style passage id.
    pub async fn passage(&self, bible_id: &str, passage_id: &str) -> Result<String, UpstreamError> {
        self.content(&["bibles", bible_id, "passages", passage_id]).await
    }

    /// Every verse of a chapter, fetched one by one in batches.
    ///
    /// Calls run concurrently within a batch of [`BATCH_SIZE`] and batches run
    /// one after another. The result is sorted by verse number.
    pub async fn chapter_verses(
        &self,
        bible_id: &str,
        chapter_id: &str,
    ) -> Result<Vec<VerseRecord>, UpstreamError> {
        let ids = self.verse_ids(bible_id, chapter_id).await?;

        let results = in_batches(&ids, |(number, id)| {
            let number = *number;
            let id = id.clone();
            async move {
                self.verse_text(bible_id, &id)
                    .await
                    .map(|text| VerseRecord::new(number, text))
            }
        })
        .await;

        let mut verses = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        verses.sort_by_key(|v| v.number);
        Ok(verses)
    }

    /// Verse count of every chapter of a book.
    pub async fn verse_counts(
        &self,
        bible_id: &str,
        book_id: &str,
    ) -> Result<Vec<ChapterVerseCount>, UpstreamError> {
        let chapters = self.list_chapters(bible_id, book_id).await?;

        let results = in_batches(&chapters, |number| {
            let number = *number;
            async move {
                let chapter_id = format!("{book_id}.{number}");
                self.verse_ids(bible_id, &chapter_id)
                    .await
                    .map(|ids| ChapterVerseCount {
                        number,
                        verses: ids.len() as u32,
                    })
            }
        })
        .await;

        let mut counts = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        counts.sort_by_key(|c| c.number);
        Ok(counts)
    }

    /// The edition catalogue, optionally restricted to one language code.
    pub async fn list_bibles(
        &self,
        language: Option<&str>,
    ) -> Result<Vec<BibleSummary>, UpstreamError> {
        match language {
            Some(lang) => self.get_json(&["bibles"], &[("language", lang)]).await,
            None => self.get_json(&["bibles"], &[]).await,
        }
    }

    async fn content(&self, segments: &[&str]) -> Result<String, UpstreamError> {
        let item: ContentItem = self
            .get_json(
                segments,
                &[
                    ("content-type", "text"),
                    ("include-verse-numbers", "true"),
                    ("include-titles", "false"),
                ],
            )
            .await?;
        Ok(item.content)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let result = self.fetch(segments, query).await;
        record_upstream(PROVIDER, &result);
        if let Err(e) = &result {
            tracing::warn!(path = %segments.join("/"), error = %e, "scripture provider call failed");
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::NotConfigured)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Malformed("provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);

        let resp = self
            .http
            .get(url)
            .header("api-key", api_key)
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut message = resp.text().await.unwrap_or_default();
            truncate(&mut message, MAX_ERROR_BODY);
            return Err(UpstreamError::Unavailable {
                status: Some(status.as_u16()),
                message,
            });
        }

        let body = resp.text().await?;
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        Ok(envelope.data)
    }
}

/// Match a canon entry against an edition's books.
///
/// Tries the USFM code, then the exact normalised name or abbreviation, then
/// a normalised prefix in either direction.
pub fn map_book<'a>(books: &'a [ProviderBook], entry: &CanonEntry) -> Option<&'a ProviderBook> {
    let wanted = normalize_key(entry.name);

    books
        .iter()
        .find(|b| canon::by_code(b.id.trim()).is_some_and(|e| e.name == entry.name))
        .or_else(|| {
            books.iter().find(|b| {
                normalize_key(&b.name) == wanted || normalize_key(&b.abbreviation) == wanted
            })
        })
        .or_else(|| {
            books.iter().find(|b| {
                let name = normalize_key(&b.name);
                !name.is_empty() && (name.starts_with(&wanted) || wanted.starts_with(&name))
            })
        })
}

/// Run `f` over `items`, concurrently within each batch, batches in sequence.
///
/// Output order matches input order.
async fn in_batches<T, R, F, Fut>(items: &[T], f: F) -> Vec<R>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(BATCH_SIZE) {
        out.extend(join_all(chunk.iter().map(&f)).await);
    }
    out
}

fn truncate(s: &mut String, max: usize) {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectio_core::canon;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ScriptureClient {
        ScriptureClient::new(&server.uri(), Some("test-key".to_string()), Duration::from_secs(5))
            .unwrap()
    }

    fn book(id: &str, name: &str, abbreviation: &str) -> ProviderBook {
        ProviderBook {
            id: id.to_string(),
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
        }
    }

    #[tokio::test]
    async fn list_books_sends_key_and_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .and(header("api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "GEN", "bibleId": "b1", "abbreviation": "Gn", "name": "Genèse"},
                    {"id": "EXO", "bibleId": "b1", "abbreviation": "Ex", "name": "Exode"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let books = client(&server).list_books("b1").await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0], book("GEN", "Genèse", "Gn"));
    }

    #[tokio::test]
    async fn list_chapters_skips_intro() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books/JUD/chapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "JUD.intro", "number": "intro"},
                    {"id": "JUD.1", "number": "1"}
                ]
            })))
            .mount(&server)
            .await;

        let chapters = client(&server).list_chapters("b1", "JUD").await.unwrap();
        assert_eq!(chapters, vec![1]);
    }

    #[tokio::test]
    async fn chapter_verses_are_batched_and_sorted() {
        let server = MockServer::start().await;
        let ids: Vec<_> = (1..=12).map(|n| json!({"id": format!("GEN.1.{n}")})).collect();
        Mock::given(method("GET"))
            .and(path("/bibles/b1/chapters/GEN.1/verses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ids })))
            .mount(&server)
            .await;

        for n in 1..=12u64 {
            // Earlier verses answer later so completion order differs.
            Mock::given(method("GET"))
                .and(path(format!("/bibles/b1/verses/GEN.1.{n}")))
                .and(query_param("content-type", "text"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_delay(Duration::from_millis((13 - n) * 10))
                        .set_body_json(json!({"data": {"id": format!("GEN.1.{n}"), "content": format!("  verset {n} ")}})),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let verses = client(&server).chapter_verses("b1", "GEN.1").await.unwrap();
        let numbers: Vec<_> = verses.iter().map(|v| v.number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
        assert_eq!(verses[0].text, "verset 1");
    }

    #[tokio::test]
    async fn verse_counts_per_chapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books/RUT/chapters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"number": "2"}, {"number": "1"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/chapters/RUT.1/verses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "RUT.1.1"}, {"id": "RUT.1.2"}, {"id": "RUT.1.3"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/chapters/RUT.2/verses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "RUT.2.1"}]
            })))
            .mount(&server)
            .await;

        let counts = client(&server).verse_counts("b1", "RUT").await.unwrap();
        assert_eq!(
            counts,
            vec![
                ChapterVerseCount { number: 1, verses: 3 },
                ChapterVerseCount { number: 2, verses: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn passage_requests_numbered_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/passages/JHN.3.16-JHN.3.17"))
            .and(query_param("include-verse-numbers", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "JHN.3.16-JHN.3.17", "content": "[16] Car Dieu a tant aimé [17] Dieu n'a pas envoyé"}
            })))
            .mount(&server)
            .await;

        let text = client(&server).passage("b1", "JHN.3.16-JHN.3.17").await.unwrap();
        assert!(text.starts_with("[16]"));
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server).list_books("b1").await.unwrap_err();
        match err {
            UpstreamError::Unavailable { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"books": []})))
            .mount(&server)
            .await;

        let err = client(&server).list_books("b1").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles/b1/books"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(2))
                    .set_body_json(json!({"data": []})),
            )
            .mount(&server)
            .await;

        let client = ScriptureClient::new(
            &server.uri(),
            Some("test-key".to_string()),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = client.list_books("b1").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout));
    }

    #[tokio::test]
    async fn missing_key_never_calls_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ScriptureClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap();
        assert!(!client.is_configured());
        let err = client.list_books("b1").await.unwrap_err();
        assert!(matches!(err, UpstreamError::NotConfigured));
    }

    #[test]
    fn map_book_prefers_code_then_name_then_prefix() {
        let jean = canon::by_name("Jean").unwrap();

        let by_code = [book("1JN", "1 Jean", "1Jn"), book("JHN", "Évangile selon Jean", "Jn")];
        assert_eq!(map_book(&by_code, jean).unwrap().id, "JHN");

        let lower_code = [book("1jn", "", ""), book(" jhn ", "", "")];
        assert_eq!(map_book(&lower_code, jean).unwrap().id, " jhn ");

        let by_name = [book("X1", "1 Jean", ""), book("X2", "JEAN", "")];
        assert_eq!(map_book(&by_name, jean).unwrap().id, "X2");

        let genese = canon::by_name("Genèse").unwrap();
        let by_prefix = [book("B1", "Genese (Bereshit)", "")];
        assert_eq!(map_book(&by_prefix, genese).unwrap().id, "B1");

        let none = [book("Z", "Zohar", "")];
        assert!(map_book(&none, genese).is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let mut s = "éééé".to_string();
        truncate(&mut s, 3);
        assert_eq!(s, "é");
    }
}
