//! Transcripts stored as service JSON output.

use super::{Transcriber, Transcript};
use crate::error::{NotebookError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Reads `{text, segments: [{start, end, text}], language}` JSON.
///
/// Given a media file, looks for a sidecar next to it: `talk.mp3.json`
/// first, then `talk.json`. A path ending in `.json` is read directly.
#[derive(Debug, Clone, Default)]
pub struct TranscriptFile;

impl TranscriptFile {
    pub fn new() -> Self {
        Self
    }

    /// Candidate JSON paths for a media or transcript path.
    fn candidates(path: &Path) -> Vec<PathBuf> {
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            return vec![path.to_path_buf()];
        }

        let mut appended = path.as_os_str().to_owned();
        appended.push(".json");
        vec![PathBuf::from(appended), path.with_extension("json")]
    }

    /// Parse a transcript from a JSON file.
    pub async fn load(path: &Path) -> Result<Transcript> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| {
            NotebookError::Transcription(format!("{} is not a transcript: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl Transcriber for TranscriptFile {
    #[instrument(skip(self), fields(media_path = %media_path.display()))]
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript> {
        for candidate in Self::candidates(media_path) {
            if candidate.exists() {
                debug!("Reading transcript from {}", candidate.display());
                return Self::load(&candidate).await;
            }
        }

        Err(NotebookError::NotFound(format!(
            "transcript for {}",
            media_path.display()
        )))
    }
}
