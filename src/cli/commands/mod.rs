//! CLI command implementations.

mod ask;
mod config;
mod export;
mod generate;
mod ingest;
mod list;
mod models;
mod serve;
mod templates;

pub use ask::run_ask;
pub use config::run_config;
pub use export::run_export;
pub use generate::{run_generate, run_overview, run_report, run_summarize};
pub use ingest::run_ingest;
pub use list::run_list;
pub use models::{run_models, run_test};
pub use serve::{api_router, run_serve};
pub use templates::run_templates;

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Notebook;
use crate::provider::Provider;
use anyhow::Context;

/// Parse a provider argument.
fn parse_provider(name: &str) -> anyhow::Result<Provider> {
    name.parse::<Provider>().map_err(|e| anyhow::anyhow!(e))
}

/// Instructions given inline, or read from the file after a leading `@`.
fn read_instructions(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => {
            let path = Settings::expand_path(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template {}", path.display()))
        }
        None => Ok(arg.to_string()),
    }
}

/// Run discovery when the requested model is not a built-in key.
async fn ensure_routable(notebook: &Notebook, model: Option<&str>) {
    let key = model.unwrap_or(notebook.settings().generation.default_model.as_str());
    if notebook.router().supports(key) {
        return;
    }

    let spinner = Output::spinner("Discovering models...");
    let result = notebook.discover_models().await;
    spinner.finish_and_clear();
    for (provider, message) in &result.provider_errors {
        Output::warning(&format!("{}: {}", provider.display_name(), message));
    }
}
