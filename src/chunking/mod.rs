//! Splitting transcripts into retrieval-sized pieces.
//!
//! [`SegmentChunker`] groups timed segments into [`TranscriptChunk`]s that
//! keep their time bounds; [`chunk_text`] splits plain text into overlapping
//! windows.

mod segments;
mod text;

pub use segments::SegmentChunker;
pub use text::chunk_text;

use serde::{Deserialize, Serialize};

/// A contiguous, time-bounded span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptChunk {
    /// Document this chunk belongs to.
    pub source_id: i64,
    pub text: String,
    /// Start of the first segment folded into the chunk, in seconds.
    pub start_time: f64,
    /// End of the last segment folded into the chunk, in seconds.
    pub end_time: f64,
    /// Position of the chunk within its document.
    pub sequence_index: u32,
}

impl TranscriptChunk {
    /// Globally unique id, `{source_id}_{sequence_index}`.
    pub fn chunk_id(&self) -> String {
        chunk_id(self.source_id, self.sequence_index)
    }

    /// Duration of this chunk in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Format the start time for display.
    pub fn format_timestamp(&self) -> String {
        crate::transcription::format_timestamp(self.start_time)
    }
}

/// Build the id of a chunk.
pub fn chunk_id(source_id: i64, sequence_index: u32) -> String {
    format!("{}_{}", source_id, sequence_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id() {
        let chunk = TranscriptChunk {
            source_id: 42,
            text: "x".to_string(),
            start_time: 61.0,
            end_time: 75.5,
            sequence_index: 3,
        };
        assert_eq!(chunk.chunk_id(), "42_3");
        assert_eq!(chunk.duration(), 14.5);
        assert_eq!(chunk.format_timestamp(), "01:01");
    }
}
