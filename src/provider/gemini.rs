//! Google Gemini API.
//!
//! Only models advertising `generateContent` are usable. Generation always
//! goes to one working model, discovered on first use and memoized for the
//! lifetime of the adapter.

use super::http::{endpoint, send_json};
use super::{
    key_suffix, ConnectionStatus, ModelDescriptor, Provider, ProviderAdapter, ProviderError,
    ProviderErrorKind, ProviderResult,
};
use crate::credentials::CredentialStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Most capable first.
const PREFERRED_MODELS: [&str; 4] = [
    "gemini-1.5-pro-latest",
    "gemini-1.5-pro",
    "gemini-pro",
    "gemini-1.0-pro",
];

/// Used when discovery fails or finds nothing. Never memoized.
const FALLBACK_MODEL: &str = "gemini-pro";

const GENERATE_CONTENT: &str = "generateContent";

/// Adapter for the Gemini API.
pub struct GeminiAdapter {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    base_url: String,
    preferred: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiAdapter {
    pub fn new(client: reqwest::Client, credentials: Arc<dyn CredentialStore>, base_url: &str) -> Self {
        Self {
            client,
            credentials,
            base_url: base_url.to_string(),
            preferred: OnceCell::new(),
        }
    }

    fn api_key(&self) -> ProviderResult<String> {
        let key = self.credentials.get(Provider::Google);
        if key.is_empty() {
            Err(ProviderError::not_configured(Provider::Google))
        } else {
            Ok(key)
        }
    }

    /// Names (without the `models/` prefix) of every generation-capable model.
    async fn capable_models(&self, key: &str) -> ProviderResult<Vec<String>> {
        let request = self
            .client
            .get(endpoint(&self.base_url, "v1beta/models"))
            .query(&[("pageSize", "1000")])
            .header("x-goog-api-key", key);
        let response: ListModelsResponse = send_json(Provider::Google, request, None).await?;

        debug!("Gemini listed {} models", response.models.len());
        Ok(response
            .models
            .into_iter()
            .filter(|m| m.supported_generation_methods.iter().any(|g| g == GENERATE_CONTENT))
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect())
    }

    /// The memoized working model, discovering it if not yet known.
    async fn working_model(&self, key: &str) -> String {
        if let Some(model) = self.preferred.get() {
            return model.clone();
        }

        info!("Discovering available Gemini models");
        match self.capable_models(key).await {
            Ok(models) => {
                if let Some(model) = pick_preferred(&models) {
                    info!("Using Gemini model {}", model);
                    // A concurrent discovery may have won; either choice is valid.
                    let _ = self.preferred.set(model.clone());
                    return self.preferred.get().cloned().unwrap_or(model);
                }
                warn!("No generation-capable Gemini models found");
            }
            Err(e) => warn!("Failed to discover Gemini models: {}", e.detail),
        }

        warn!("Using fallback Gemini model {}", FALLBACK_MODEL);
        FALLBACK_MODEL.to_string()
    }

    async fn generate_with(&self, key: &str, model: &str, prompt: &str) -> ProviderResult<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let path = format!("v1beta/models/{}:{}", model, GENERATE_CONTENT);
        let request = self
            .client
            .post(endpoint(&self.base_url, &path))
            .header("x-goog-api-key", key)
            .json(&body);
        let response: GenerateResponse = send_json(Provider::Google, request, Some(model)).await?;

        Ok(response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

/// First preferred model that is available, else the first capable one.
fn pick_preferred(capable: &[String]) -> Option<String> {
    PREFERRED_MODELS
        .iter()
        .find(|p| capable.iter().any(|m| m == *p))
        .map(|p| p.to_string())
        .or_else(|| capable.first().cloned())
}

/// Uppercase letters that follow a non-letter, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

fn describe(model_name: &str) -> ModelDescriptor {
    ModelDescriptor::new(
        Provider::Google.model_key(&key_suffix(model_name)),
        format!("Google: {}", title_case(model_name)),
        Provider::Google,
        model_name,
    )
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn is_configured(&self) -> bool {
        !self.credentials.get(Provider::Google).is_empty()
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
        let key = match self.api_key() {
            Ok(key) => key,
            Err(_) => {
                info!("Google Gemini API key not configured, skipping");
                return Ok(Vec::new());
            }
        };

        info!("Querying Google Gemini for available models");
        let models: Vec<ModelDescriptor> = self
            .capable_models(&key)
            .await?
            .iter()
            .map(|name| describe(name))
            .collect();

        info!("Found {} Google Gemini models", models.len());
        Ok(models)
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
        let key = self.api_key()?;
        let model = self.working_model(&key).await;
        debug!(
            "Sending prompt to Gemini model {} (requested {})",
            model, backend_model_id
        );
        self.generate_with(&key, &model, prompt).await
    }

    async fn test_connection(&self) -> ConnectionStatus {
        let key = match self.api_key() {
            Ok(key) => key,
            Err(e) => return ConnectionStatus::failed(&e),
        };

        let attempt = match self.capable_models(&key).await {
            Ok(models) => match pick_preferred(&models) {
                Some(model) => self.generate_with(&key, &model, "Hi").await.map(|_| model),
                None => {
                    let err = ProviderError::new(
                        Provider::Google,
                        ProviderErrorKind::NoModelsInstalled,
                        "no model supports generateContent",
                    );
                    return ConnectionStatus::failed(&err);
                }
            },
            Err(e) => Err(e),
        };

        let outcome = match attempt {
            Ok(model) => Ok(model),
            Err(e) => {
                debug!("Gemini test with discovered model failed: {}", e.detail);
                self.generate_with(&key, FALLBACK_MODEL, "Hi")
                    .await
                    .map(|_| FALLBACK_MODEL.to_string())
            }
        };

        match outcome {
            Ok(model) => ConnectionStatus::ok(
                Provider::Google,
                format!("Google Gemini API connection successful (using {})", model),
            ),
            Err(e) => {
                warn!("Google Gemini connection test failed: {}", e.detail);
                ConnectionStatus::failed(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pick_preferred_walks_preference_order() {
        let capable = names(&["gemini-1.5-flash", "gemini-pro", "gemini-1.5-pro"]);
        assert_eq!(pick_preferred(&capable).as_deref(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn test_pick_preferred_falls_back_to_first_capable() {
        let capable = names(&["gemini-2.0-flash", "gemini-1.5-flash"]);
        assert_eq!(pick_preferred(&capable).as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(pick_preferred(&[]), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("gemini-1.5-pro"), "Gemini-1.5-Pro");
        assert_eq!(title_case("gemini-2.0-flash-exp"), "Gemini-2.0-Flash-Exp");
        assert_eq!(title_case("text-bison-001"), "Text-Bison-001");
    }

    #[test]
    fn test_describe() {
        let model = describe("gemini-1.5-flash");
        assert_eq!(model.key, "gemini_gemini_1_5_flash");
        assert_eq!(model.label, "Google: Gemini-1.5-Flash");
        assert_eq!(model.backend_model_id, "gemini-1.5-flash");
    }

    #[test]
    fn test_list_response_parses_capabilities() {
        let json = r#"{"models":[
            {"name":"models/gemini-1.5-pro","supportedGenerationMethods":["generateContent","countTokens"]},
            {"name":"models/embedding-001","supportedGenerationMethods":["embedContent"]}
        ]}"#;
        let parsed: ListModelsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.models.len(), 2);
        assert_eq!(parsed.models[1].supported_generation_methods, ["embedContent"]);
    }
}
