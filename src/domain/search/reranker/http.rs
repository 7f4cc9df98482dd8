//! HTTP reranker talking to a text-embeddings-inference style `/rerank`
//! endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ModelSettings;
use crate::domain::search::traits::{ModelError, Reranker};

/// Reranker backed by an inference server exposing `POST /rerank` with the
/// request shape `{"query": ..., "texts": [...]}` and per-text scores in
/// the response.
#[derive(Clone)]
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_input_chars: usize,
}

#[derive(Deserialize)]
struct RerankEntry {
    index: usize,
    score: f32,
}

impl HttpReranker {
    pub fn new(settings: &ModelSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/rerank", settings.reranker_url.trim_end_matches('/')),
            model: settings.reranker_model.clone(),
            max_input_chars: settings.max_input_chars,
        }
    }

    fn truncate<'t>(&self, text: &'t str) -> &'t str {
        if text.len() <= self.max_input_chars {
            return text;
        }
        let mut cut = self.max_input_chars;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        &text[..cut]
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>, ModelError> {
        if passages.is_empty() {
            return Ok(vec![]);
        }

        let texts: Vec<&str> = passages.iter().map(|p| self.truncate(p)).collect();
        let body = serde_json::json!({
            "query": self.truncate(query),
            "texts": texts,
            "model": self.model,
            "raw_scores": true,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ModelError::Inference(format!(
                "rerank endpoint returned {}",
                response.status()
            )));
        }

        let entries: Vec<RerankEntry> = response
            .json()
            .await
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        // The endpoint returns entries sorted by score; map them back to
        // input order.
        let mut scores = vec![f32::NEG_INFINITY; passages.len()];
        for entry in entries {
            if entry.index >= scores.len() {
                return Err(ModelError::Inference(format!(
                    "rerank entry index {} out of range",
                    entry.index
                )));
            }
            scores[entry.index] = entry.score;
        }
        if scores.iter().any(|s| s.is_infinite()) {
            return Err(ModelError::Inference(
                "rerank response is missing passages".into(),
            ));
        }

        Ok(scores)
    }
}
