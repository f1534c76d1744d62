//! Downloadable renderings of transcripts and generated text.

use crate::error::NotebookError;
use crate::transcription::{format_timestamp, Transcript};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// File format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "txt")]
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    /// Value for the `Content-Type` header.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = NotebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(NotebookError::InvalidInput(format!(
                "Unknown export format '{}'. Must be one of: md, txt",
                other
            ))),
        }
    }
}

/// What an export contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Transcript,
    Summary,
    Overview,
    Report,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Transcript => "transcript",
            ContentKind::Summary => "summary",
            ContentKind::Overview => "overview",
            ContentKind::Report => "report",
        }
    }

    /// Markdown heading placed above the content.
    pub fn heading(&self) -> &'static str {
        match self {
            ContentKind::Transcript => "# Transcription",
            ContentKind::Summary => "# Summary",
            ContentKind::Overview => "# Overview",
            ContentKind::Report => "# Report",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = NotebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcript" => Ok(ContentKind::Transcript),
            "summary" => Ok(ContentKind::Summary),
            "overview" => Ok(ContentKind::Overview),
            "report" => Ok(ContentKind::Report),
            other => Err(NotebookError::InvalidInput(format!(
                "Unknown content type '{}'. Must be one of: transcript, summary, overview, report",
                other
            ))),
        }
    }
}

/// An export request.
///
/// When `content` is given it is exported as is (with a heading for
/// Markdown) instead of being generated again.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub source_id: i64,
    pub content_type: ContentKind,
    pub format: ExportFormat,
    /// Required for reports.
    #[serde(default)]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub model_key: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A rendered export ready to save or serve.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub file_name: String,
    pub format: ExportFormat,
    pub content: String,
}

impl Export {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Value for the `Content-Disposition` header.
    pub fn disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Markdown transcript with one `**[MM:SS]** text` line per segment.
pub fn transcript_markdown(transcript: &Transcript) -> String {
    let mut lines = vec![format!("{}\n", ContentKind::Transcript.heading())];
    for segment in &transcript.segments {
        lines.push(format!(
            "**[{}]** {}",
            format_timestamp(segment.start_seconds),
            segment.text.trim()
        ));
    }
    lines.join("\n")
}

/// Plain transcript text.
pub fn transcript_text(transcript: &Transcript) -> String {
    let text = transcript.full_text();
    if text.trim().is_empty() {
        "No text found.".to_string()
    } else {
        text
    }
}

/// Content under its heading for Markdown, trimmed for plain text.
pub fn format_content(content: &str, kind: ContentKind, format: ExportFormat) -> String {
    let content = content.trim();
    if content.is_empty() {
        return "No content provided.".to_string();
    }
    match format {
        ExportFormat::Text => content.to_string(),
        ExportFormat::Markdown => format!("{}\n\n{}", kind.heading(), content),
    }
}

/// Generated report under a heading naming its template.
pub fn format_report(content: &str, template_name: &str, format: ExportFormat) -> String {
    match format {
        ExportFormat::Text => content.to_string(),
        ExportFormat::Markdown => format!(
            "{}: {}\n\n{}",
            ContentKind::Report.heading(),
            template_name,
            content
        ),
    }
}

/// `{kind}_{source_id}.{ext}`, or `report_{template}_{source_id}.{ext}` for
/// reports. Template names keep only alphanumerics and underscores.
pub fn file_name(
    kind: ContentKind,
    source_id: i64,
    format: ExportFormat,
    template_name: Option<&str>,
) -> String {
    match (kind, template_name) {
        (ContentKind::Report, Some(name)) => {
            let name: String = name
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            format!("report_{}_{}.{}", name, source_id, format.extension())
        }
        _ => format!("{}_{}.{}", kind, source_id, format.extension()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptSegment;

    #[test]
    fn test_transcript_markdown() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(0.0, 4.0, " Welcome back. "),
            TranscriptSegment::new(75.5, 80.0, "Next item."),
        ]);
        assert_eq!(
            transcript_markdown(&transcript),
            "# Transcription\n\n**[00:00]** Welcome back.\n**[01:15]** Next item."
        );
        assert_eq!(transcript_markdown(&Transcript::new(Vec::new())), "# Transcription\n");
    }

    #[test]
    fn test_transcript_text() {
        let transcript = Transcript::new(vec![
            TranscriptSegment::new(0.0, 4.0, "Welcome back."),
            TranscriptSegment::new(4.0, 8.0, "Next item."),
        ]);
        assert_eq!(transcript_text(&transcript), transcript.full_text());
        assert_eq!(transcript_text(&Transcript::new(Vec::new())), "No text found.");
    }

    #[test]
    fn test_format_content() {
        assert_eq!(
            format_content("  - one\n- two \n", ContentKind::Summary, ExportFormat::Markdown),
            "# Summary\n\n- one\n- two"
        );
        assert_eq!(
            format_content("Paragraph.", ContentKind::Overview, ExportFormat::Text),
            "Paragraph."
        );
        assert_eq!(
            format_content("   ", ContentKind::Report, ExportFormat::Markdown),
            "No content provided."
        );
        assert_eq!(
            format_report("Body", "Weekly", ExportFormat::Markdown),
            "# Report: Weekly\n\nBody"
        );
        assert_eq!(format_report("Body", "Weekly", ExportFormat::Text), "Body");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(ContentKind::Summary, 4, ExportFormat::Markdown, None),
            "summary_4.md"
        );
        assert_eq!(
            file_name(ContentKind::Report, 4, ExportFormat::Text, Some("Board / Q3 review!")),
            "report_BoardQ3review_4.txt"
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert!("pdf".parse::<ExportFormat>().is_err());
        assert_eq!("overview".parse::<ContentKind>().unwrap(), ContentKind::Overview);
        assert!("slides".parse::<ContentKind>().is_err());

        let req: ExportRequest = serde_json::from_str(
            r#"{"source_id": 2, "content_type": "report", "format": "txt", "template_id": 5}"#,
        )
        .unwrap();
        assert_eq!(req.content_type, ContentKind::Report);
        assert_eq!(req.format, ExportFormat::Text);
        assert_eq!(req.template_id, Some(5));
        assert!(req.content.is_none());
    }
}
