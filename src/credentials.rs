//! Provider credentials.
//!
//! Adapters ask the store for a key on every call so settings changes apply
//! without a restart. An empty string means the provider is not configured.

use crate::config::Settings;
use crate::provider::Provider;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Source of provider API keys.
pub trait CredentialStore: Send + Sync {
    /// The key for `provider`, or an empty string if unset.
    fn get(&self, provider: Provider) -> String;
}

/// Reads keys from the configuration file each time, falling back to the
/// provider's environment variable.
pub struct ConfigCredentials {
    config_path: Option<PathBuf>,
}

impl ConfigCredentials {
    /// Use the default configuration file location.
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Use a specific configuration file.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }
}

impl Default for ConfigCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for ConfigCredentials {
    fn get(&self, provider: Provider) -> String {
        let configured = match Settings::load_from(self.config_path.as_ref()) {
            Ok(settings) => settings.providers.api_key(provider).unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load credentials from config: {}", e);
                String::new()
            }
        };

        let key = configured.trim();
        if !key.is_empty() {
            return key.to_string();
        }

        env_var(provider)
            .and_then(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

/// Fixed in-memory keys.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<Provider, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key for a provider.
    pub fn with_key(mut self, provider: Provider, key: &str) -> Self {
        self.keys.insert(provider, key.to_string());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn get(&self, provider: Provider) -> String {
        self.keys.get(&provider).cloned().unwrap_or_default()
    }
}

/// Environment variable consulted when the config holds no key.
pub fn env_var(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Ollama => None,
        Provider::OpenAI => Some("OPENAI_API_KEY"),
        Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
        Provider::Google => Some("GOOGLE_API_KEY"),
    }
}

/// Mask a secret for display or logging.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        n if n <= 6 => "*".repeat(n),
        n => format!(
            "{}...{} (length: {})",
            chars[..4].iter().collect::<String>(),
            chars[n - 2..].iter().collect::<String>(),
            n
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials() {
        let creds = StaticCredentials::new().with_key(Provider::OpenAI, "sk-test");
        assert_eq!(creds.get(Provider::OpenAI), "sk-test");
        assert_eq!(creds.get(Provider::Anthropic), "");
    }

    #[test]
    fn test_config_credentials_read_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let creds = ConfigCredentials::with_path(path.clone());

        std::fs::write(&path, "[providers.anthropic]\napi_key = \"first\"\n").unwrap();
        assert_eq!(creds.get(Provider::Anthropic), "first");

        std::fs::write(&path, "[providers.anthropic]\napi_key = \"second\"\n").unwrap();
        assert_eq!(creds.get(Provider::Anthropic), "second");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "<empty>");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("sk-abcdefgh12"), "sk-a...12 (length: 13)");
    }
}
