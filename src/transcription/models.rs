//! Data models for transcripts.

use serde::{Deserialize, Serialize};

/// A complete transcript as returned by a transcription service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Full transcript text.
    #[serde(default)]
    pub text: String,
    /// Timed segments in playback order.
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    /// Language reported by the service, if any.
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcript {
    /// Create a transcript from segments, deriving the full text.
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        let text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            text,
            segments,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Full text, rebuilt from segments when the service sent none.
    pub fn full_text(&self) -> String {
        if self.text.trim().is_empty() {
            Transcript::new(self.segments.clone()).text
        } else {
            self.text.clone()
        }
    }

    /// Total duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.segments.last().map(|s| s.end_seconds).unwrap_or(0.0)
    }

    /// Format the transcript with timestamps for display.
    pub fn format_with_timestamps(&self) -> String {
        self.segments
            .iter()
            .map(|s| {
                format!(
                    "[{} - {}] {}",
                    format_timestamp(s.start_seconds),
                    format_timestamp(s.end_seconds),
                    s.text.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    #[serde(alias = "start")]
    pub start_seconds: f64,
    /// End time in seconds.
    #[serde(alias = "end")]
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: impl Into<String>) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text: text.into(),
        }
    }

    /// Duration of this segment in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
