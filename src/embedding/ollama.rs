//! Embeddings from a local Ollama server.

use super::{check_dimensions, Embedder};
use crate::error::{NotebookError, Result};
use crate::provider::http::endpoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Calls `POST /api/embed` with a batch of inputs.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, dimensions: usize) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| NotebookError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let response = self
            .client
            .post(endpoint(&self.base_url, "api/embed"))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| NotebookError::Embedding(format!("Ollama embed request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotebookError::Embedding(format!(
                "Ollama embed error (HTTP {}): {}",
                status, body
            )));
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(NotebookError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        check_dimensions(&parsed.embeddings, self.dimensions)?;

        Ok(parsed.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
