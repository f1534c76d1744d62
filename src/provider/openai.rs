//! OpenAI chat models via async-openai.

use super::error::{classify_message, classify_transport};
use super::{
    key_suffix, ConnectionStatus, ModelDescriptor, Provider, ProviderAdapter, ProviderError,
    ProviderErrorKind, ProviderResult,
};
use crate::credentials::CredentialStore;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Model ids containing one of these are chat-capable GPT models.
const CHAT_MODEL_MARKERS: [&str; 3] = ["gpt-4", "gpt-3.5", "gpt-5"];

/// Adapter for the OpenAI API.
pub struct OpenAIAdapter {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    base_url: Option<String>,
    test_model: String,
}

impl OpenAIAdapter {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
        base_url: Option<&str>,
        test_model: &str,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url: base_url.map(str::to_string),
            test_model: test_model.to_string(),
        }
    }

    /// Build an SDK client with the current key, or `None` if unset.
    fn client(&self) -> Option<Client<OpenAIConfig>> {
        let key = self.credentials.get(Provider::OpenAI);
        if key.is_empty() {
            return None;
        }

        let mut config = OpenAIConfig::new().with_api_key(key);
        if let Some(base) = &self.base_url {
            config = config.with_api_base(base.trim_end_matches('/'));
        }
        Some(sdk_client(config, self.http.clone()))
    }

    fn require_client(&self) -> ProviderResult<Client<OpenAIConfig>> {
        self.client()
            .ok_or_else(|| ProviderError::not_configured(Provider::OpenAI))
    }

    async fn chat(
        &self,
        client: &Client<OpenAIConfig>,
        model: &str,
        prompt: &str,
        max_tokens: Option<u32>,
    ) -> ProviderResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| ProviderError::unknown(Provider::OpenAI, e.to_string()))?
                .into()];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model).messages(messages);
        if let Some(limit) = max_tokens {
            args.max_completion_tokens(limit);
        }
        let request = args
            .build()
            .map_err(|e| ProviderError::unknown(Provider::OpenAI, e.to_string()))?;

        let response = client
            .chat()
            .create(request)
            .await
            .map_err(|e| map_sdk_error(e, Some(model)))?;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

/// SDK client that returns the first failure instead of retrying it.
///
/// async-openai retries rate limits and server errors by default.
pub(crate) fn sdk_client(config: OpenAIConfig, http: reqwest::Client) -> Client<OpenAIConfig> {
    let no_retry = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(Duration::ZERO))
        .build();
    Client::with_config(config)
        .with_http_client(http)
        .with_backoff(no_retry)
}

/// Map an async-openai error into the shared taxonomy.
fn map_sdk_error(err: OpenAIError, model: Option<&str>) -> ProviderError {
    match err {
        OpenAIError::Reqwest(e) => classify_transport(Provider::OpenAI, &e),
        OpenAIError::ApiError(api) => match api.code.as_deref() {
            Some("invalid_api_key") => ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::InvalidCredential,
                api.message,
            ),
            Some("model_not_found") => ProviderError::new(
                Provider::OpenAI,
                ProviderErrorKind::ModelUnavailable(model.unwrap_or_default().to_string()),
                api.message,
            ),
            _ => classify_message(Provider::OpenAI, &api.message, model),
        },
        other => classify_message(Provider::OpenAI, &other.to_string(), model),
    }
}

/// Descriptor for a listed model id, if it is a chat model.
fn describe(model_id: &str) -> Option<ModelDescriptor> {
    if !CHAT_MODEL_MARKERS.iter().any(|m| model_id.contains(m)) {
        return None;
    }

    Some(ModelDescriptor::new(
        Provider::OpenAI.model_key(&key_suffix(model_id)),
        format!("OpenAI: {}", model_id.to_uppercase()),
        Provider::OpenAI,
        model_id,
    ))
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn is_configured(&self) -> bool {
        !self.credentials.get(Provider::OpenAI).is_empty()
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
        let Some(client) = self.client() else {
            info!("OpenAI API key not configured, skipping");
            return Ok(Vec::new());
        };

        info!("Querying OpenAI for available models");
        let response = client
            .models()
            .list()
            .await
            .map_err(|e| map_sdk_error(e, None))?;

        let mut ids: Vec<String> = response.data.into_iter().map(|m| m.id).collect();
        ids.sort();

        let models: Vec<ModelDescriptor> = ids.iter().filter_map(|id| describe(id)).collect();
        info!("Found {} OpenAI models", models.len());
        Ok(models)
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
        let client = self.require_client()?;
        debug!("Sending prompt to OpenAI model {}", backend_model_id);
        self.chat(&client, backend_model_id, prompt, None).await
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let result = match self.require_client() {
            Ok(client) => self.chat(&client, &self.test_model, "Hi", Some(5)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => ConnectionStatus::ok(Provider::OpenAI, "OpenAI API connection successful"),
            Err(e) => {
                warn!("OpenAI connection test failed: {}", e.detail);
                ConnectionStatus::failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;

    #[test]
    fn test_describe_filters_chat_models() {
        let model = describe("gpt-4o-mini").unwrap();
        assert_eq!(model.key, "openai_gpt_4o_mini");
        assert_eq!(model.label, "OpenAI: GPT-4O-MINI");
        assert_eq!(model.backend_model_id, "gpt-4o-mini");

        assert!(describe("gpt-3.5-turbo").is_some());
        assert!(describe("text-embedding-3-small").is_none());
        assert!(describe("whisper-1").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_silent_for_discovery() {
        let adapter = OpenAIAdapter::new(
            reqwest::Client::new(),
            Arc::new(StaticCredentials::new()),
            None,
            "gpt-4o-mini",
        );
        assert!(adapter.list_models().await.unwrap().is_empty());

        let err = adapter.generate("gpt-4o", "hi").await.unwrap_err();
        assert!(err.is_not_configured());

        let status = adapter.test_connection().await;
        assert!(!status.success);
        assert_eq!(
            status.message,
            "OpenAI API key is not configured. Add it in Settings to use OpenAI models."
        );
    }
}
