//! Ask command implementation.

use super::ensure_routable;
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::orchestrator::Notebook;
use anyhow::Result;
use std::sync::Arc;

/// Run the ask command.
pub async fn run_ask(
    source_id: i64,
    question: &str,
    model: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    ensure_routable(&notebook, model).await;

    let spinner = Output::spinner("Searching source...");

    match notebook.ask(source_id, question, model).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer.answer);

            if !answer.citations.is_empty() {
                Output::header("Sources");
                for chunk in &answer.citations {
                    Output::citation(&chunk.format_timestamp(), &chunk.text);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
