//! Configuration settings for the notebook backend.

use crate::error::{NotebookError, Result};
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub providers: ProvidersSettings,
    pub generation: GenerationSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub rag: RagSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.notebook".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Per-provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersSettings {
    pub ollama: OllamaSettings,
    pub openai: OpenAISettings,
    pub anthropic: AnthropicSettings,
    pub google: GoogleSettings,
}

impl ProvidersSettings {
    /// The API key stored in the config for a cloud provider.
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Ollama => None,
            Provider::OpenAI => self.openai.api_key.clone(),
            Provider::Anthropic => self.anthropic.api_key.clone(),
            Provider::Google => self.google.api_key.clone(),
        }
    }

    /// Check that every configured base URL parses.
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("providers.ollama.base_url", Some(self.ollama.base_url.as_str())),
            ("providers.openai.base_url", self.openai.base_url.as_deref()),
            ("providers.anthropic.base_url", Some(self.anthropic.base_url.as_str())),
            ("providers.google.base_url", Some(self.google.base_url.as_str())),
        ];

        for (name, url) in urls {
            if let Some(url) = url {
                url::Url::parse(url).map_err(|e| {
                    NotebookError::Config(format!("{} is not a valid URL ({}): {}", name, url, e))
                })?;
            }
        }
        Ok(())
    }
}

/// Local Ollama engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub base_url: String,
    /// Model used by the connection test.
    pub test_model: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            test_model: "mistral".to_string(),
        }
    }
}

/// OpenAI API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// API key. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Override for the API base (defaults to the SDK's).
    pub base_url: Option<String>,
    pub test_model: String,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            test_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Anthropic API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    /// API key. Falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
    pub test_model: String,
    /// Token cap for generation requests.
    pub max_tokens: u32,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            test_model: "claude-3-5-haiku-20241022".to_string(),
            max_tokens: 4096,
        }
    }
}

/// Google Gemini API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// API key. Falls back to `GOOGLE_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

/// Text generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Model key used when a request names none.
    pub default_model: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model: "ollama_mistral".to_string(),
        }
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// A chunk closes once its text reaches this many characters.
    pub max_chunk_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: 1000,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (ollama, openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Base URL for the ollama provider.
    pub base_url: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "all-minilm".to_string(),
            dimensions: 384,
            base_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.notebook/vectors.db".to_string(),
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Number of chunks retrieved to ground an answer.
    pub max_context_chunks: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            max_context_chunks: 3,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NotebookError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notebook")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Copy with API keys masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for key in [
            &mut copy.providers.openai.api_key,
            &mut copy.providers.anthropic.api_key,
            &mut copy.providers.google.api_key,
        ] {
            if let Some(k) = key.as_mut() {
                *k = crate::credentials::mask_secret(k);
            }
        }
        copy
    }
}
