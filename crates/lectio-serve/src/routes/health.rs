//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Whether the scripture provider has a credential.
    scripture: bool,
    /// Whether motifs come from the LLM provider.
    llm: bool,
    stored_verses: usize,
}

/// `GET /health`
///
/// Never calls a provider; safe for load balancer probes.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        scripture: state.scripture.is_configured(),
        llm: state.llm.is_some(),
        stored_verses: state.store.len(),
    })
}
