//! Generation commands: raw prompt, summary, overview and report.

use super::{ensure_routable, read_instructions};
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::orchestrator::{Generated, Notebook};
use anyhow::Result;
use std::sync::Arc;

/// Run the generate command.
pub async fn run_generate(
    prompt: &str,
    model: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    ensure_routable(&notebook, model).await;

    let key = model.unwrap_or(notebook.settings().generation.default_model.as_str());
    let spinner = Output::spinner(&format!("Generating with {}...", key));
    let result = notebook.router().route(key, prompt).await;
    spinner.finish_and_clear();

    match result {
        Ok(text) => println!("{}", text),
        Err(e) => {
            Output::error(&e.to_string());
            return Err(e.into());
        }
    }
    Ok(())
}

/// Run the summarize command.
pub async fn run_summarize(
    source_id: i64,
    model: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    ensure_routable(&notebook, model).await;

    let spinner = Output::spinner("Summarizing...");
    let result = notebook.summarize(source_id, model).await;
    spinner.finish_and_clear();
    print_generated(result?);
    Ok(())
}

/// Run the overview command.
pub async fn run_overview(
    source_id: i64,
    model: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    ensure_routable(&notebook, model).await;

    let spinner = Output::spinner("Writing overview...");
    let result = notebook.overview(source_id, model).await;
    spinner.finish_and_clear();
    print_generated(result?);
    Ok(())
}

/// Run the report command with inline instructions or a stored template.
pub async fn run_report(
    source_id: i64,
    template: Option<&str>,
    template_id: Option<i64>,
    model: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let template = template.map(read_instructions).transpose()?;

    let notebook = Notebook::new(settings, credentials)?;
    ensure_routable(&notebook, model).await;

    let spinner = Output::spinner("Writing report...");
    let result = match template_id {
        Some(id) => notebook.report_with_template(source_id, id, model).await,
        None => {
            let template = template.unwrap_or_default();
            notebook.report(source_id, &template, model).await
        }
    };
    spinner.finish_and_clear();
    print_generated(result?);
    Ok(())
}

fn print_generated(generated: Generated) {
    if generated.text.starts_with("Error: ") {
        Output::warning(&generated.text);
    } else {
        println!("\n{}\n", generated.text);
    }
}
