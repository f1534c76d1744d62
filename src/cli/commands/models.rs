//! Model discovery and connection test commands.

use super::parse_provider;
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::discovery::DiscoveryAggregator;
use crate::provider::build_adapters;
use anyhow::Result;
use std::sync::Arc;

/// Run the models command.
pub async fn run_models(
    provider: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let discovery = DiscoveryAggregator::new(build_adapters(&settings, credentials));

    if let Some(name) = provider {
        let provider = parse_provider(name)?;
        if discovery.adapter(provider).is_some_and(|a| !a.is_configured()) {
            Output::warning(&format!(
                "{} has no API key; set providers.{}.api_key or {}.",
                provider.display_name(),
                provider.as_str(),
                crate::credentials::env_var(provider).unwrap_or_default()
            ));
            return Ok(());
        }

        let spinner = Output::spinner(&format!("Asking {}...", provider.display_name()));
        let models = discovery.list_provider(provider).await;
        spinner.finish_and_clear();

        match models {
            Ok(models) => {
                Output::header(&format!("{} models ({})", provider.display_name(), models.len()));
                for model in &models {
                    Output::model(&model.key, &model.label);
                }
            }
            Err(e) => {
                Output::error(&e.to_string());
                return Err(e.into());
            }
        }
        return Ok(());
    }

    let spinner = Output::spinner("Discovering models...");
    let result = discovery.discover_all().await;
    spinner.finish_and_clear();

    Output::header(&format!("Available models ({})", result.count()));
    for model in &result.models {
        Output::model(&model.key, &model.label);
    }

    if !result.provider_errors.is_empty() {
        Output::header("Provider errors");
        for (provider, message) in &result.provider_errors {
            Output::list_item(&format!("{}: {}", provider.display_name(), message));
        }
    }

    Ok(())
}

/// Run the test command.
pub async fn run_test(
    provider: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let discovery = DiscoveryAggregator::new(build_adapters(&settings, credentials));

    if let Some(name) = provider {
        let provider = parse_provider(name)?;
        let Some(adapter) = discovery.adapter(provider) else {
            anyhow::bail!("No adapter for {}", provider.display_name());
        };

        let spinner = Output::spinner(&format!("Testing {}...", provider.display_name()));
        let status = adapter.test_connection().await;
        spinner.finish_and_clear();

        Output::connection(provider.display_name(), status.success, &status.message);
        if !status.success {
            anyhow::bail!("{} connection test failed", provider.display_name());
        }
        return Ok(());
    }

    let spinner = Output::spinner("Testing all providers...");
    let report = discovery.test_all().await;
    spinner.finish_and_clear();

    Output::header("Connection tests");
    for (provider, status) in &report.results {
        Output::connection(provider.display_name(), status.success, &status.message);
    }
    println!();
    Output::kv(
        "Working",
        &format!("{}/{}", report.summary.working, report.summary.total),
    );

    Ok(())
}
