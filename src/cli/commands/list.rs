//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::{SqliteVectorStore, TranscriptStore, VectorStore};
use anyhow::Result;
use std::collections::HashMap;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let store = SqliteVectorStore::new(&settings.sqlite_path())?;

    let transcripts = store.list_transcripts().await?;
    if transcripts.is_empty() {
        Output::info("No sources ingested yet. Use 'notebook ingest <path> --source-id <id>' to add one.");
        return Ok(());
    }

    let chunk_counts: HashMap<i64, u32> = store
        .list_sources()
        .await?
        .into_iter()
        .map(|s| (s.source_id, s.chunk_count))
        .collect();

    Output::header(&format!("Sources ({})", transcripts.len()));
    println!();
    for item in &transcripts {
        Output::source_info(
            &item.title,
            item.source_id,
            item.transcript.segments.len(),
            item.transcript.duration_seconds(),
        );
    }

    let total_chunks: u32 = chunk_counts.values().sum();
    println!();
    Output::kv("Total sources", &transcripts.len().to_string());
    Output::kv("Total chunks", &total_chunks.to_string());

    Ok(())
}
