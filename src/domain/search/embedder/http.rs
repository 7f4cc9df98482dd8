//! HTTP embedder talking to a text-embeddings-inference style endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::EMBEDDING_DIMENSIONS;
use crate::config::ModelSettings;
use crate::domain::search::traits::{Embedder, ModelError};

/// Embedder backed by an inference server exposing `POST /embed` with the
/// text-embeddings-inference request shape `{"inputs": [...]}`.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_input_chars: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Vectors(Vec<Vec<f32>>),
    Error { error: String },
}

impl HttpEmbedder {
    pub fn new(settings: &ModelSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/embed", settings.embedding_url.trim_end_matches('/')),
            model: settings.embedding_model.clone(),
            max_input_chars: settings.max_input_chars,
        }
    }

    /// Right-truncation: the head of the text is kept, the tail dropped.
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

    async fn request(&self, inputs: Vec<&str>) -> Result<Vec<Vec<f32>>, ModelError> {
        let expected = inputs.len();
        let body = serde_json::json!({
            "inputs": inputs,
            "model": self.model,
            "truncate": true,
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
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let vectors = match parsed {
            EmbedResponse::Vectors(vectors) => vectors,
            EmbedResponse::Error { error } => return Err(ModelError::Inference(error)),
        };

        if vectors.len() != expected {
            return Err(ModelError::Inference(format!(
                "expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != EMBEDDING_DIMENSIONS) {
            return Err(ModelError::Inference(format!(
                "embedding has {} dimensions, expected {}",
                bad.len(),
                EMBEDDING_DIMENSIONS
            )));
        }

        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        if text.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIMENSIONS]);
        }
        let vectors = self.request(vec![self.truncate(text)]).await?;
        Ok(vectors.into_iter().next().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Empty strings never reach the model; their slot stays a zero
        // vector.
        let mut results = vec![vec![0.0f32; EMBEDDING_DIMENSIONS]; texts.len()];
        let non_empty: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(|(i, t)| (i, self.truncate(t)))
            .collect();

        if non_empty.is_empty() {
            return Ok(results);
        }

        let inputs: Vec<&str> = non_empty.iter().map(|(_, t)| *t).collect();
        let vectors = self.request(inputs).await?;

        for ((original_idx, _), vector) in non_empty.iter().zip(vectors) {
            results[*original_idx] = vector;
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_input_chars: usize) -> ModelSettings {
        ModelSettings {
            embedding_url: "http://localhost:8081".into(),
            embedding_model: "almanach/camembertav2-base".into(),
            reranker_url: "http://localhost:8082".into(),
            reranker_model: "cross-encoder/mmarco-mMiniLMv2-L12-H384-v1".into(),
            timeout_secs: 5,
            max_input_chars,
        }
    }

    #[test]
    fn truncation_keeps_the_head() {
        let embedder = HttpEmbedder::new(&settings(10));
        assert_eq!(embedder.truncate("0123456789abcdef"), "0123456789");
        assert_eq!(embedder.truncate("court"), "court");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let embedder = HttpEmbedder::new(&settings(5));
        // "héhé" is 6 bytes; cutting at 5 would split the second 'é'.
        let cut = embedder.truncate("héhéhé");
        assert!(cut.len() <= 5);
        assert!("héhéhé".starts_with(cut));
    }
}
