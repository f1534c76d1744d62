//! Local Ollama engine.

use super::http::{endpoint, send_json};
use super::{
    ConnectionStatus, ModelDescriptor, Provider, ProviderAdapter, ProviderError,
    ProviderErrorKind, ProviderResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Adapter for a local Ollama server. Needs no credential.
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    test_model: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, test_model: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            test_model: test_model.to_string(),
        }
    }
}

/// Build the descriptor for an installed model name such as `llama3:latest`.
fn describe(installed_name: &str) -> Option<ModelDescriptor> {
    let base = installed_name.split(':').next().unwrap_or_default();
    if base.is_empty() {
        return None;
    }

    Some(ModelDescriptor::new(
        Provider::Ollama.model_key(base),
        format!("Ollama: {}", capitalize(base)),
        Provider::Ollama,
        installed_name,
    ))
}

/// Uppercase the first character and lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
        info!("Querying Ollama for installed models");

        let request = self.client.get(endpoint(&self.base_url, "api/tags"));
        let tags: TagsResponse = send_json(Provider::Ollama, request, None).await?;

        if tags.models.is_empty() {
            warn!("Ollama is running but no models are installed");
            return Err(ProviderError::new(
                Provider::Ollama,
                ProviderErrorKind::NoModelsInstalled,
                "/api/tags returned no models",
            ));
        }

        // Several tags of one model collapse to a single key.
        let mut seen = HashSet::new();
        let models: Vec<ModelDescriptor> = tags
            .models
            .iter()
            .filter_map(|m| describe(&m.name))
            .filter(|d| seen.insert(d.key.clone()))
            .collect();

        info!("Found {} Ollama models", models.len());
        Ok(models)
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
        debug!("Sending chat request to Ollama model {}", backend_model_id);

        let body = ChatRequest {
            model: backend_model_id,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let request = self
            .client
            .post(endpoint(&self.base_url, "api/chat"))
            .json(&body);
        let response: ChatResponse =
            send_json(Provider::Ollama, request, Some(backend_model_id)).await?;

        Ok(response.message.content)
    }

    async fn test_connection(&self) -> ConnectionStatus {
        match self.generate(&self.test_model, "Hi").await {
            Ok(_) => ConnectionStatus::ok(
                Provider::Ollama,
                format!("Ollama model '{}' is working correctly", self.test_model),
            ),
            Err(e) => {
                warn!("Ollama connection test failed: {}", e.detail);
                ConnectionStatus::failed(&e)
            }
        }
    }
}
