//! Language-model providers.
//!
//! Each backend (the local Ollama engine and three cloud APIs) sits behind
//! the [`ProviderAdapter`] trait, which offers discovery, generation and a
//! connection test. Failures come back as a [`ProviderError`] tagged with
//! the provider and a [`ProviderErrorKind`].

mod anthropic;
pub mod error;
mod gemini;
pub mod http;
mod ollama;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use error::{ErrorCategory, ProviderError, ProviderErrorKind};
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAIAdapter;
pub(crate) use openai::sdk_client;

use crate::config::Settings;
use crate::credentials::CredentialStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result type for adapter calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// A language-model backend.
///
/// Declaration order is the display order used by discovery: local first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAI,
    Anthropic,
    Google,
}

impl Provider {
    /// All providers in display order.
    pub const ALL: [Provider; 4] = [
        Provider::Ollama,
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Google,
    ];

    /// Stable identifier used in configuration and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Human-readable name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAI => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google Gemini",
        }
    }

    /// Prefix every model key of this provider starts with.
    pub fn namespace(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "claude",
            Provider::Google => "gemini",
        }
    }

    /// Build a model key in this provider's namespace.
    pub fn model_key(&self, suffix: &str) -> String {
        format!("{}_{}", self.namespace(), suffix)
    }

    /// Recover the provider from a model key's namespace prefix.
    pub fn from_model_key(key: &str) -> Option<Provider> {
        Provider::ALL.into_iter().find(|p| {
            key.strip_prefix(p.namespace())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }

    /// Whether the provider runs locally and needs no credential.
    pub fn is_local(&self) -> bool {
        matches!(self, Provider::Ollama)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "google" | "gemini" => Ok(Provider::Google),
            _ => Err(format!(
                "Invalid provider '{}'. Must be one of: ollama, openai, anthropic, google",
                s
            )),
        }
    }
}

/// A model offered by a provider at discovery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Globally unique, provider-prefixed key (e.g. `ollama_mistral`).
    pub key: String,
    /// Display label (e.g. `Ollama: Mistral`).
    pub label: String,
    pub provider: Provider,
    /// Name the backend itself knows the model by.
    #[serde(rename = "model_id")]
    pub backend_model_id: String,
}

impl ModelDescriptor {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        provider: Provider,
        backend_model_id: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            provider,
            backend_model_id: backend_model_id.into(),
        }
    }
}

/// Outcome of a connection test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub provider: Provider,
    pub success: bool,
    pub message: String,
}

impl ConnectionStatus {
    pub fn ok(provider: Provider, message: impl Into<String>) -> Self {
        Self {
            provider,
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(err: &ProviderError) -> Self {
        Self {
            provider: err.provider,
            success: false,
            message: err.user_message(),
        }
    }
}

/// Uniform capability wrapper over one model backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Whether the credential this adapter needs is present.
    ///
    /// Local adapters need none and are always configured.
    fn is_configured(&self) -> bool {
        true
    }

    /// Ask the backend which models it currently offers.
    ///
    /// Cloud adapters without a credential return an empty list.
    async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>>;

    /// Run one prompt against a backend model. Never retries.
    async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String>;

    /// Make one minimal real round-trip to validate the setup.
    async fn test_connection(&self) -> ConnectionStatus;
}

/// Build all four adapters from settings, in display order.
pub fn build_adapters(
    settings: &Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Vec<Arc<dyn ProviderAdapter>> {
    let providers = &settings.providers;
    let client = http::create_client();

    vec![
        Arc::new(OllamaAdapter::new(
            client.clone(),
            &providers.ollama.base_url,
            &providers.ollama.test_model,
        )),
        Arc::new(OpenAIAdapter::new(
            client.clone(),
            credentials.clone(),
            providers.openai.base_url.as_deref(),
            &providers.openai.test_model,
        )),
        Arc::new(AnthropicAdapter::new(
            client.clone(),
            credentials.clone(),
            &providers.anthropic.base_url,
            &providers.anthropic.test_model,
            providers.anthropic.max_tokens,
        )),
        Arc::new(GeminiAdapter::new(
            client,
            credentials,
            &providers.google.base_url,
        )),
    ]
}

/// Replace the separators cloud vendors use in model ids so they fit a key.
pub(crate) fn key_suffix(model_id: &str) -> String {
    model_id.replace(['-', '.'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_namespaces_round_trip() {
        for provider in Provider::ALL {
            let key = provider.model_key("something");
            assert_eq!(Provider::from_model_key(&key), Some(provider));
        }
        assert_eq!(Provider::from_model_key("claude_3_opus"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_model_key("ollamamistral"), None);
        assert_eq!(Provider::from_model_key("mistral"), None);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Gemini".parse::<Provider>(), Ok(Provider::Google));
        assert_eq!("anthropic".parse::<Provider>(), Ok(Provider::Anthropic));
        assert!("cohere".parse::<Provider>().is_err());
    }

    #[test]
    fn test_descriptor_serializes_model_id() {
        let model = ModelDescriptor::new("ollama_mistral", "Ollama: Mistral", Provider::Ollama, "mistral");
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["provider"], "ollama");
        assert_eq!(json["model_id"], "mistral");
    }

    #[test]
    fn test_key_suffix() {
        assert_eq!(key_suffix("gpt-4.1-mini"), "gpt_4_1_mini");
        assert_eq!(key_suffix("gemini-1.5-pro"), "gemini_1_5_pro");
    }
}
