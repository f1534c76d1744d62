//! Live model discovery across every provider.
//!
//! Discovery never fails as a whole: each provider's failure is reduced to
//! one user-facing message and the remaining providers are still queried.

use crate::provider::{
    ConnectionStatus, ModelDescriptor, Provider, ProviderAdapter, ProviderError,
    ProviderErrorKind,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One diagnostic sentence per provider that is unconfigured or failing.
pub type ProviderErrorMap = BTreeMap<Provider, String>;

/// Merged result of one discovery pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryResult {
    /// Models in provider display order.
    pub models: Vec<ModelDescriptor>,
    pub provider_errors: ProviderErrorMap,
}

impl DiscoveryResult {
    pub fn count(&self) -> usize {
        self.models.len()
    }

    /// Number of models per provider. Providers with none are omitted.
    pub fn provider_counts(&self) -> BTreeMap<Provider, usize> {
        let mut counts = BTreeMap::new();
        for model in &self.models {
            *counts.entry(model.provider).or_insert(0) += 1;
        }
        counts
    }
}

/// Connection test results for every provider.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub results: BTreeMap<Provider, ConnectionStatus>,
    pub summary: ConnectionSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    #[serde(rename = "total_providers")]
    pub total: usize,
    #[serde(rename = "working_providers")]
    pub working: usize,
    #[serde(rename = "failed_providers")]
    pub failed: usize,
}

/// Queries a fixed, ordered set of adapters.
pub struct DiscoveryAggregator {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl DiscoveryAggregator {
    /// Adapters are queried in the order given.
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapter(&self, provider: Provider) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.iter().find(|a| a.provider() == provider)
    }

    /// Ask every provider for its models and merge the answers.
    #[instrument(skip(self))]
    pub async fn discover_all(&self) -> DiscoveryResult {
        let mut result = DiscoveryResult::default();

        for adapter in &self.adapters {
            let provider = adapter.provider();
            // Missing cloud keys mean "not opted in": no request is made.
            if !adapter.is_configured() {
                debug!("{} has no API key, skipping", provider.display_name());
                result.provider_errors.insert(
                    provider,
                    ProviderError::not_configured(provider).user_message(),
                );
                continue;
            }

            match adapter.list_models().await {
                Ok(models) => result.models.extend(models),
                Err(e) if e.is_not_configured() => {
                    result.provider_errors.insert(provider, e.user_message());
                }
                Err(e) => {
                    if e.kind == ProviderErrorKind::Unknown {
                        warn!("Unexpected {} error: {}", provider.display_name(), e.detail);
                    } else {
                        info!("{} unavailable: {}", provider.display_name(), e.detail);
                    }
                    result.provider_errors.insert(provider, e.user_message());
                }
            }
        }

        info!(
            "Total available models across all providers: {}",
            result.count()
        );
        if !result.provider_errors.is_empty() {
            info!("Provider errors: {:?}", result.provider_errors);
        }
        result
    }

    /// Discover one provider's models, surfacing its error directly.
    pub async fn list_provider(
        &self,
        provider: Provider,
    ) -> crate::error::Result<Vec<ModelDescriptor>> {
        let adapter = self.adapter(provider).ok_or_else(|| {
            crate::error::NotebookError::NotFound(format!("provider '{}'", provider))
        })?;
        Ok(adapter.list_models().await?)
    }

    /// Run every provider's connection test.
    #[instrument(skip(self))]
    pub async fn test_all(&self) -> ConnectionReport {
        let mut results = BTreeMap::new();
        for adapter in &self.adapters {
            let status = adapter.test_connection().await;
            results.insert(adapter.provider(), status);
        }

        let working = results.values().filter(|s| s.success).count();
        let summary = ConnectionSummary {
            total: results.len(),
            working,
            failed: results.len() - working,
        };
        info!(
            "Connection tests: {}/{} providers working",
            summary.working, summary.total
        );

        ConnectionReport { results, summary }
    }
}
