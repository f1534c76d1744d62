//! Model registry: internal model keys mapped to provider and backend model.

use crate::error::{NotebookError, Result};
use crate::provider::{ModelDescriptor, Provider};
use serde::Serialize;
use std::collections::BTreeMap;

/// Built-in keys as (key, backend model id).
const BUILTIN_MODELS: [(&str, &str); 11] = [
    ("ollama_mistral", "mistral"),
    ("ollama_llama3", "llama3"),
    ("openai_gpt5", "gpt-5"),
    ("openai_gpt5_mini", "gpt-5-mini"),
    ("openai_gpt5_nano", "gpt-5-nano"),
    ("openai_gpt4o", "gpt-4o"),
    ("openai_gpt4_turbo", "gpt-4-turbo"),
    ("claude_3_5_sonnet", "claude-3-5-sonnet-20240620"),
    ("claude_3_opus", "claude-3-opus-20240229"),
    ("gemini_1_5_pro", "gemini-1.5-pro"),
    ("gemini_1_5_flash", "gemini-1.5-flash"),
];

/// A routable model: which provider serves it and under what name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub provider: Provider,
    pub backend_model_id: String,
}

/// Table of routable model keys.
///
/// Every entry carries its provider explicitly; the key prefix is checked
/// once, when the entry is added.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ModelRegistry {
    /// Registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the built-in model table.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (key, backend_model_id) in BUILTIN_MODELS {
            // Built-in keys all carry a known namespace.
            if let Some(provider) = Provider::from_model_key(key) {
                registry.insert(key, provider, backend_model_id);
            }
        }
        registry
    }

    fn insert(&mut self, key: &str, provider: Provider, backend_model_id: &str) {
        self.entries.insert(
            key.to_string(),
            RegistryEntry {
                provider,
                backend_model_id: backend_model_id.to_string(),
            },
        );
    }

    /// Add or replace an entry from a discovered model.
    ///
    /// The key must sit in the namespace of the descriptor's provider.
    pub fn register(&mut self, descriptor: &ModelDescriptor) -> Result<()> {
        match Provider::from_model_key(&descriptor.key) {
            Some(p) if p == descriptor.provider => {
                self.insert(&descriptor.key, p, &descriptor.backend_model_id);
                Ok(())
            }
            _ => Err(NotebookError::InvalidInput(format!(
                "Model key '{}' is not in the '{}' namespace",
                descriptor.key,
                descriptor.provider.namespace()
            ))),
        }
    }

    /// Look up a model key.
    pub fn resolve(&self, key: &str) -> Result<&RegistryEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| NotebookError::UnsupportedModel(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.len(), 11);

        let entry = registry.resolve("ollama_mistral").unwrap();
        assert_eq!(entry.provider, Provider::Ollama);
        assert_eq!(entry.backend_model_id, "mistral");

        let entry = registry.resolve("claude_3_opus").unwrap();
        assert_eq!(entry.provider, Provider::Anthropic);

        let entry = registry.resolve("gemini_1_5_flash").unwrap();
        assert_eq!(entry.provider, Provider::Google);
    }

    #[test]
    fn test_unknown_key_is_unsupported() {
        let registry = ModelRegistry::builtin();
        let err = registry.resolve("unknown_key").unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedModel(ref k) if k == "unknown_key"));
        assert_eq!(err.to_string(), "Model 'unknown_key' is not supported.");
    }

    #[test]
    fn test_register_discovered_model() {
        let mut registry = ModelRegistry::builtin();
        let model = ModelDescriptor::new(
            "ollama_qwen2.5",
            "Ollama: Qwen2.5",
            Provider::Ollama,
            "qwen2.5:7b",
        );
        registry.register(&model).unwrap();

        let entry = registry.resolve("ollama_qwen2.5").unwrap();
        assert_eq!(entry.backend_model_id, "qwen2.5:7b");
    }

    #[test]
    fn test_register_rejects_foreign_namespace() {
        let mut registry = ModelRegistry::empty();
        let model = ModelDescriptor::new("openai_llama3", "Llama 3", Provider::Ollama, "llama3");
        assert!(registry.register(&model).is_err());
        assert!(registry.is_empty());
    }
}
