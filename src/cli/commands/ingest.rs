//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::orchestrator::Notebook;
use anyhow::Result;
use std::sync::Arc;

/// Run the ingest command.
pub async fn run_ingest(
    path: &str,
    source_id: i64,
    title: Option<&str>,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    let path = Settings::expand_path(path);

    let spinner = Output::spinner("Chunking and indexing transcript...");
    let result = notebook.ingest_file(source_id, &path, title).await;
    spinner.finish_and_clear();

    match result {
        Ok(ingested) => {
            if ingested.chunks_indexed == 0 {
                Output::warning("Transcript has no segments; nothing was indexed.");
            }
            Output::success(&format!(
                "Ingested '{}' as source {} ({} chunks)",
                ingested.title, ingested.source_id, ingested.chunks_indexed
            ));
        }
        Err(e) => {
            Output::error(&format!("Failed to ingest {}: {}", path.display(), e));
            return Err(e.into());
        }
    }

    Ok(())
}
