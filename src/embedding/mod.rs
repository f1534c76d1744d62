//! Embedding generation for chunk retrieval.

mod ollama;
mod openai;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingSettings;
use crate::credentials::CredentialStore;
use crate::error::{NotebookError, Result};
use crate::provider::Provider;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
///
/// Implementations must return fixed-dimension vectors and be deterministic
/// for identical text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Fail unless every vector has `expected` components.
pub fn check_dimensions(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(v) => Err(NotebookError::Embedding(format!(
            "Expected {}-dimensional embeddings, got {}",
            expected,
            v.len()
        ))),
        None => Ok(()),
    }
}

/// Create the embedder named by the settings.
pub fn create_embedder(
    settings: &EmbeddingSettings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<Arc<dyn Embedder>> {
    match settings.provider.to_lowercase().as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            crate::provider::http::create_client(),
            &settings.base_url,
            &settings.model,
            settings.dimensions as usize,
        ))),
        "openai" => {
            let key = credentials.get(Provider::OpenAI);
            if key.is_empty() {
                return Err(NotebookError::Config(
                    "OpenAI embeddings need an API key (providers.openai.api_key or OPENAI_API_KEY)"
                        .to_string(),
                ));
            }
            Ok(Arc::new(OpenAIEmbedder::with_config(
                &key,
                &settings.model,
                settings.dimensions as usize,
            )))
        }
        other => Err(NotebookError::Config(format!(
            "Unknown embedding provider '{}'. Must be one of: ollama, openai",
            other
        ))),
    }
}
