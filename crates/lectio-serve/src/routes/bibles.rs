//! Edition catalogue endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use lectio_core::reference::fold;
use serde::Deserialize;

use super::Envelope;
use crate::cache::{ListingKey, get_or_compute};
use crate::error::ApiError;
use crate::scripture::BibleSummary;
use crate::state::AppState;

/// Query parameters for the catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct BiblesQuery {
    /// ISO 639-3 language code (e.g., "fra").
    pub lang: Option<String>,
    /// Text matched against name, abbreviation and description.
    pub q: Option<String>,
}

/// `GET /bibles`
///
/// The provider catalogue for one language, cached for an hour, then
/// filtered locally by `q`.
pub async fn list_bibles(
    State(state): State<AppState>,
    params: Result<Query<BiblesQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<BibleSummary>>>, ApiError> {
    let Query(params) = params?;
    if !state.scripture.is_configured() {
        return Err(ApiError::ConfigurationMissing("SCRIPTURE_API_KEY"));
    }

    let lang = params
        .lang
        .as_deref()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty());

    if let Some(l) = &lang
        && !l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ApiError::BadRequest(format!("invalid lang value: '{l}'")));
    }

    let key = ListingKey::bibles(lang.as_deref());
    let bibles = get_or_compute(&state.cache, &key, || {
        state.scripture.list_bibles(lang.as_deref())
    })
    .await?;

    let bibles = match params.q.as_deref().map(fold) {
        Some(needle) if !needle.trim().is_empty() => bibles
            .into_iter()
            .filter(|b| matches_query(b, needle.trim()))
            .collect(),
        _ => bibles,
    };

    Ok(Json(Envelope::new(bibles)))
}

fn matches_query(bible: &BibleSummary, needle: &str) -> bool {
    fold(&bible.name).contains(needle)
        || fold(&bible.abbreviation).contains(needle)
        || bible
            .description
            .as_deref()
            .is_some_and(|d| fold(d).contains(needle))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn catalogue() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles"))
            .and(query_param("language", "fra"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": "a1", "name": "Louis Segond 1910", "abbreviation": "LSG",
                     "description": "Bible Louis Segond", "language": {"id": "fra", "name": "French"}},
                    {"id": "b2", "name": "Bible du Semeur", "abbreviation": "BDS",
                     "description": "Traduction en français courant"},
                    {"id": "c3", "name": "Segond 21", "abbreviation": "S21"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn lists_catalogue_for_language() {
        let server = catalogue().await;
        let state = state(mocked_config(&server.uri()));

        let (status, body) = get(&state, "/bibles?lang=fra").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["data"][0]["language"]["id"], "fra");
    }

    #[tokio::test]
    async fn q_filters_on_folded_text_from_cache() {
        let server = catalogue().await;
        let state = state(mocked_config(&server.uri()));

        let (_, body) = get(&state, "/bibles?lang=fra&q=segond").await;
        let ids: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a1", "c3"]);

        // "FRANCAIS" matches "français" once folded; served from cache.
        let (_, body) = get(&state, "/bibles?lang=fra&q=FRANCAIS").await;
        assert_eq!(body["data"][0]["id"], "b2");
    }

    #[tokio::test]
    async fn provider_failure_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bibles"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let state = state(mocked_config(&server.uri()));

        let (status, body) = get(&state, "/bibles").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "upstream_unavailable");
    }

    #[tokio::test]
    async fn requires_credentials() {
        let state = state(config());
        let (status, body) = get(&state, "/bibles").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "configuration_missing");
    }

    #[tokio::test]
    async fn rejects_odd_language_codes() {
        let state = state(mocked_config("http://127.0.0.1:9"));
        let (status, _) = get(&state, "/bibles?lang=fr%26x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
