//! Grouping timed segments into chunks.

use super::TranscriptChunk;
use crate::transcription::TranscriptSegment;

/// Accumulates segments until the text reaches a size limit.
///
/// A chunk closes once its text is at least `max_chunk_chars` characters,
/// or when the input runs out. Segments are never split, so one oversized
/// segment becomes a chunk of its own. Blank segments are skipped and no
/// chunk is ever empty.
#[derive(Debug, Clone, Copy)]
pub struct SegmentChunker {
    max_chunk_chars: usize,
}

impl SegmentChunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    pub fn max_chunk_chars(&self) -> usize {
        self.max_chunk_chars
    }

    /// Chunk the segments of one document, in order.
    pub fn chunk(&self, source_id: i64, segments: &[TranscriptSegment]) -> Vec<TranscriptChunk> {
        let mut chunks = Vec::new();
        let mut pending: Option<Pending> = None;

        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }

            let current = pending.get_or_insert_with(|| Pending {
                text: String::new(),
                chars: 0,
                start_time: segment.start_seconds,
                end_time: segment.end_seconds,
            });

            if !current.text.is_empty() {
                current.text.push(' ');
                current.chars += 1;
            }
            current.text.push_str(text);
            current.chars += text.chars().count();
            current.end_time = segment.end_seconds;

            if current.chars >= self.max_chunk_chars {
                if let Some(done) = pending.take() {
                    chunks.push(done.finish(source_id, chunks.len()));
                }
            }
        }

        if let Some(done) = pending {
            chunks.push(done.finish(source_id, chunks.len()));
        }
        chunks
    }
}

impl Default for SegmentChunker {
    fn default() -> Self {
        Self::new(1000)
    }
}

struct Pending {
    text: String,
    chars: usize,
    start_time: f64,
    end_time: f64,
}

impl Pending {
    fn finish(self, source_id: i64, index: usize) -> TranscriptChunk {
        TranscriptChunk {
            source_id,
            text: self.text,
            start_time: self.start_time,
            end_time: self.end_time,
            sequence_index: index as u32,
        }
    }
}
