//! Vector store abstraction for chunk embeddings.
//!
//! Records are keyed by chunk id and every query is scoped to one source
//! document.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::TranscriptChunk;
use crate::error::Result;
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chunk together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// `{source_id}_{sequence_index}`.
    pub chunk_id: String,
    pub chunk: TranscriptChunk,
    pub embedding: Vec<f32>,
    /// When this record was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(chunk: TranscriptChunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.chunk_id(),
            chunk,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub record: EmbeddingRecord,
    /// Cosine distance to the query (lower is nearer).
    pub distance: f32,
}

/// Summary information about an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedSource {
    pub source_id: i64,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// End time of the last chunk, in seconds.
    pub total_duration_seconds: f64,
    /// When the document was last indexed.
    pub indexed_at: DateTime<Utc>,
}

/// A transcript kept alongside the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTranscript {
    pub source_id: i64,
    pub title: String,
    pub transcript: Transcript,
    pub stored_at: DateTime<Utc>,
}

/// A named report prompt kept for reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub id: i64,
    pub name: String,
    pub prompt_text: String,
    /// Language the report is written in; detected from the source when unset.
    #[serde(default)]
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields of a template to create.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub prompt_text: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Fields of a template to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt_text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

impl TemplateUpdate {
    fn apply(self, template: &mut ReportTemplate) {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(prompt_text) = self.prompt_text {
            template.prompt_text = prompt_text;
        }
        if let Some(language) = self.language {
            template.language = Some(language);
        }
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by chunk id.
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Nearest records of one document, ordered by ascending distance.
    async fn search(
        &self,
        query_embedding: &[f32],
        source_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchResult>>;

    /// All records of a document in sequence order.
    async fn get_by_source(&self, source_id: i64) -> Result<Vec<EmbeddingRecord>>;

    /// Delete a document's records.
    async fn delete_by_source(&self, source_id: i64) -> Result<usize>;

    /// Delete a document's records whose sequence index is `first_stale` or later.
    async fn delete_from_sequence(&self, source_id: i64, first_stale: u32) -> Result<usize>;

    /// List all indexed documents.
    async fn list_sources(&self) -> Result<Vec<IndexedSource>>;

    /// Get total record count.
    async fn record_count(&self) -> Result<usize>;
}

/// Storage for raw transcripts, used by the generation pipelines.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Store or replace a document's transcript.
    async fn store_transcript(
        &self,
        source_id: i64,
        title: &str,
        transcript: &Transcript,
    ) -> Result<()>;

    async fn get_transcript(&self, source_id: i64) -> Result<Option<StoredTranscript>>;

    /// All stored transcripts, newest first.
    async fn list_transcripts(&self) -> Result<Vec<StoredTranscript>>;
}

/// Storage for named report templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Store a new template and return it with its assigned id.
    async fn create_template(&self, template: &NewTemplate) -> Result<ReportTemplate>;

    async fn get_template(&self, id: i64) -> Result<Option<ReportTemplate>>;

    /// All templates in id order.
    async fn list_templates(&self) -> Result<Vec<ReportTemplate>>;

    /// Apply an update, returning `None` when no template has the id.
    async fn update_template(
        &self,
        id: i64,
        update: TemplateUpdate,
    ) -> Result<Option<ReportTemplate>>;

    /// Whether a template with the id existed.
    async fn delete_template(&self, id: i64) -> Result<bool>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance, `1 - similarity`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Rank candidates nearest-first and keep `limit`.
///
/// Ties are broken by sequence index so results are deterministic.
pub(crate) fn rank(
    query_embedding: &[f32],
    candidates: impl IntoIterator<Item = EmbeddingRecord>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .map(|record| SearchResult {
            distance: cosine_distance(query_embedding, &record.embedding),
            record,
        })
        .collect();

    results.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.record.chunk.sequence_index.cmp(&b.record.chunk.sequence_index))
    });
    results.truncate(limit);
    results
}
