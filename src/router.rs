//! Generation routing.

use crate::error::Result;
use crate::provider::{ModelDescriptor, Provider, ProviderAdapter};
use crate::registry::ModelRegistry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{error, info, instrument, warn};

/// Dispatches prompts to the adapter that serves a model key.
pub struct Router {
    registry: RwLock<ModelRegistry>,
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
}

impl Router {
    pub fn new(registry: ModelRegistry, adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            registry: RwLock::new(registry),
            adapters: adapters.into_iter().map(|a| (a.provider(), a)).collect(),
        }
    }

    /// Make discovered models routable.
    ///
    /// Descriptors outside their provider's namespace are skipped.
    pub fn register_discovered(&self, models: &[ModelDescriptor]) -> usize {
        let mut registry = match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut added = 0;
        for model in models {
            match registry.register(model) {
                Ok(()) => added += 1,
                Err(e) => warn!("Skipping discovered model: {}", e),
            }
        }
        added
    }

    /// Whether a key can currently be routed.
    pub fn supports(&self, model_key: &str) -> bool {
        self.registry
            .read()
            .map(|r| r.contains(model_key))
            .unwrap_or(false)
    }

    /// Generate text with the model behind `model_key`.
    ///
    /// An unknown key is an error. Provider failures are returned as an
    /// inline `Error: ...` string so a multi-step pipeline keeps going.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn route(&self, model_key: &str, prompt: &str) -> Result<String> {
        let entry = {
            let registry = match self.registry.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            registry.resolve(model_key)?.clone()
        };

        let Some(adapter) = self.adapters.get(&entry.provider) else {
            error!("No adapter for provider {}", entry.provider);
            return Ok(format!(
                "Error: Could not get a response from {}. {} is not available.",
                model_key,
                entry.provider.display_name()
            ));
        };

        info!(
            "Routing {} to {} model {}",
            model_key, entry.provider, entry.backend_model_id
        );
        match adapter.generate(&entry.backend_model_id, prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                error!("Error with {}: {}", model_key, e.detail);
                Ok(format!(
                    "Error: Could not get a response from {}. {}",
                    model_key,
                    e.user_message()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotebookError;
    use crate::provider::{ConnectionStatus, ProviderError, ProviderErrorKind, ProviderResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        provider: Provider,
        fail_with: Option<ProviderErrorKind>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProviderAdapter for Recording {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
            Ok(Vec::new())
        }

        async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
            self.calls.lock().unwrap().push(backend_model_id.to_string());
            match &self.fail_with {
                Some(kind) => Err(ProviderError::new(self.provider, kind.clone(), "socket closed")),
                None => Ok(format!("echo: {}", prompt)),
            }
        }

        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus::ok(self.provider, "ok")
        }
    }

    fn recording(provider: Provider, fail_with: Option<ProviderErrorKind>) -> Arc<Recording> {
        Arc::new(Recording {
            provider,
            fail_with,
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_routes_by_registry_entry() {
        let ollama = recording(Provider::Ollama, None);
        let claude = recording(Provider::Anthropic, None);
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![ollama.clone(), claude.clone()];
        let router = Router::new(ModelRegistry::builtin(), adapters);

        let text = router.route("claude_3_opus", "hi").await.unwrap();
        assert_eq!(text, "echo: hi");
        assert_eq!(*claude.calls.lock().unwrap(), ["claude-3-opus-20240229"]);
        assert!(ollama.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_key_fails() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![recording(Provider::Ollama, None)];
        let router = Router::new(ModelRegistry::builtin(), adapters);
        let err = router.route("unknown_key", "hi").await.unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedModel(_)));
    }

    #[tokio::test]
    async fn test_adapter_failure_is_inline() {
        let adapters: Vec<Arc<dyn ProviderAdapter>> =
            vec![recording(Provider::Ollama, Some(ProviderErrorKind::Unreachable))];
        let router = Router::new(ModelRegistry::builtin(), adapters);

        let text = router.route("ollama_mistral", "hi").await.unwrap();
        assert_eq!(
            text,
            "Error: Could not get a response from ollama_mistral. \
             Ollama is not running. Please start Ollama to use local models."
        );
    }

    #[tokio::test]
    async fn test_discovered_models_become_routable() {
        let ollama = recording(Provider::Ollama, None);
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![ollama.clone()];
        let router = Router::new(ModelRegistry::builtin(), adapters);
        assert!(!router.supports("ollama_phi3"));

        let added = router.register_discovered(&[ModelDescriptor::new(
            "ollama_phi3",
            "Ollama: Phi3",
            Provider::Ollama,
            "phi3:latest",
        )]);
        assert_eq!(added, 1);

        router.route("ollama_phi3", "hi").await.unwrap();
        assert_eq!(*ollama.calls.lock().unwrap(), ["phi3:latest"]);
    }
}
