//! OpenAI-compatible client that extracts motifs for a passage.
//!
//! One `chat/completions` call per study, in JSON-object mode. The reply
//! must be `{"motifs": [...], "attributsDivins": [...]}`; anything else is an
//! error and the caller falls back to the local heuristic.

use std::time::Duration;

use lectio_core::{MotifSet, Reference};
use reqwest::Client;

use crate::metrics::record_upstream;
use crate::scripture::UpstreamError;

const PROVIDER: &str = "openai";

/// Entries kept per list after sanitising.
const MAX_MOTIFS: usize = 6;

/// Longest `directives` string forwarded to the model.
const MAX_DIRECTIVES: usize = 500;

const SYSTEM_PROMPT: &str = "Tu es un assistant d'étude biblique. Réponds uniquement par un objet JSON \
de la forme {\"motifs\":[...],\"attributsDivins\":[...]} : 3 à 6 motifs théologiques courts \
en français présents dans le passage, et 2 à 4 attributs divins qu'il met en lumière.";

/// LLM client for motif extraction.
#[derive(Clone)]
pub struct MotifClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl MotifClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for the motifs of `reference`.
    pub async fn motifs(
        &self,
        reference: &Reference,
        directives: Option<&str>,
    ) -> Result<MotifSet, UpstreamError> {
        let result = self.request(reference, directives).await;
        record_upstream(PROVIDER, &result);
        result
    }

    async fn request(
        &self,
        reference: &Reference,
        directives: Option<&str>,
    ) -> Result<MotifSet, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(reference, directives) }
            ]
        });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Unavailable {
                status: Some(status.as_u16()),
                message: text.chars().take(200).collect(),
            });
        }

        let json: serde_json::Value = resp.json().await?;

        let content = json["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| UpstreamError::Malformed("missing message content".to_string()))?;

        parse_motifs(content)
    }
}

fn user_prompt(reference: &Reference, directives: Option<&str>) -> String {
    let mut prompt = format!(
        "Passage : {} ({}, {}).",
        reference.display(),
        reference.book.testament.code(),
        reference.book.genre.label()
    );
    if let Some(d) = directives.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str("\nConsignes : ");
        prompt.extend(d.chars().take(MAX_DIRECTIVES));
    }
    prompt
}

/// Parse and sanitise the model's JSON reply.
fn parse_motifs(content: &str) -> Result<MotifSet, UpstreamError> {
    let set: MotifSet =
        serde_json::from_str(content).map_err(|e| UpstreamError::Malformed(e.to_string()))?;
    set.sanitized(MAX_MOTIFS)
        .ok_or_else(|| UpstreamError::Malformed("empty motifs or attributes".to_string()))
}
