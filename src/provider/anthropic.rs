//! Anthropic Messages API.
//!
//! Anthropic offers no model-listing endpoint, so discovery returns a pinned
//! list of known models whenever a key is configured.

use super::http::{endpoint, send_json};
use super::{
    ConnectionStatus, ModelDescriptor, Provider, ProviderAdapter, ProviderError, ProviderResult,
};
use crate::credentials::CredentialStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const API_VERSION: &str = "2023-06-01";

/// Known models as (key, label, model id).
const KNOWN_MODELS: [(&str, &str, &str); 3] = [
    (
        "claude_3_5_sonnet",
        "Anthropic: Claude 3.5 Sonnet",
        "claude-3-5-sonnet-20240620",
    ),
    (
        "claude_3_5_haiku",
        "Anthropic: Claude 3.5 Haiku",
        "claude-3-5-haiku-20241022",
    ),
    (
        "claude_3_opus",
        "Anthropic: Claude 3 Opus",
        "claude-3-opus-20240229",
    ),
];

/// Adapter for the Anthropic API.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    base_url: String,
    test_model: String,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicAdapter {
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
        base_url: &str,
        test_model: &str,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            credentials,
            base_url: base_url.to_string(),
            test_model: test_model.to_string(),
            max_tokens,
        }
    }

    /// The pinned model list.
    pub fn known_models() -> Vec<ModelDescriptor> {
        KNOWN_MODELS
            .iter()
            .map(|(key, label, id)| ModelDescriptor::new(*key, *label, Provider::Anthropic, *id))
            .collect()
    }

    async fn send(&self, model: &str, prompt: &str, max_tokens: u32) -> ProviderResult<String> {
        let key = self.credentials.get(Provider::Anthropic);
        if key.is_empty() {
            return Err(ProviderError::not_configured(Provider::Anthropic));
        }

        let body = MessagesRequest {
            model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let request = self
            .client
            .post(endpoint(&self.base_url, "v1/messages"))
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .json(&body);
        let response: MessagesResponse =
            send_json(Provider::Anthropic, request, Some(model)).await?;

        Ok(response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn is_configured(&self) -> bool {
        !self.credentials.get(Provider::Anthropic).is_empty()
    }

    async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
        if self.credentials.get(Provider::Anthropic).is_empty() {
            info!("Anthropic API key not configured, skipping");
            return Ok(Vec::new());
        }

        let models = Self::known_models();
        info!("Found {} Anthropic models", models.len());
        Ok(models)
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
        debug!("Sending prompt to Anthropic model {}", backend_model_id);
        self.send(backend_model_id, prompt, self.max_tokens).await
    }

    async fn test_connection(&self) -> ConnectionStatus {
        match self.send(&self.test_model, "Hi", 5).await {
            Ok(_) => ConnectionStatus::ok(Provider::Anthropic, "Anthropic API connection successful"),
            Err(e) => {
                warn!("Anthropic connection test failed: {}", e.detail);
                ConnectionStatus::failed(&e)
            }
        }
    }
}
