//! Transcripts and the transcription service contract.
//!
//! Transcription itself happens outside this crate. A [`Transcriber`] turns a
//! media file into text plus timed segments; [`TranscriptFile`] reads the
//! JSON a transcription service already produced.

mod file;
mod models;

pub use file::TranscriptFile;
pub use models::{format_timestamp, Transcript, TranscriptSegment};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a media file and return text with timed segments.
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript>;
}
