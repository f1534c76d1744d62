//! Export command implementation.

use super::ensure_routable;
use crate::cli::Output;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::export::{ContentKind, ExportRequest};
use crate::orchestrator::Notebook;
use anyhow::Result;
use std::sync::Arc;

/// Run the export command, writing the file into `output_dir`.
pub async fn run_export(
    request: &ExportRequest,
    output_dir: &str,
    settings: Settings,
    credentials: Arc<dyn CredentialStore>,
) -> Result<()> {
    let notebook = Notebook::new(settings, credentials)?;
    let model = request.model_key.as_deref();
    if request.content_type != ContentKind::Transcript {
        ensure_routable(&notebook, model).await;
    }

    let spinner = Output::spinner(&format!("Exporting {}...", request.content_type));
    let result = notebook.export(request).await;
    spinner.finish_and_clear();
    let exported = result?;

    let dir = Settings::expand_path(output_dir);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(&exported.file_name);
    std::fs::write(&path, &exported.content)?;

    Output::success(&format!("Wrote {}", path.display()));
    Ok(())
}
