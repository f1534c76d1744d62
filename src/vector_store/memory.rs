//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    rank, EmbeddingRecord, IndexedSource, NewTemplate, ReportTemplate, SearchResult,
    StoredTranscript, TemplateStore, TemplateUpdate, TranscriptStore, VectorStore,
};
use crate::error::{NotebookError, Result};
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddingRecord>>,
    transcripts: RwLock<HashMap<i64, StoredTranscript>>,
    templates: Mutex<BTreeMap<i64, ReportTemplate>>,
    /// Template ids are never reused.
    last_template_id: AtomicI64,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            transcripts: RwLock::new(HashMap::new()),
            templates: Mutex::new(BTreeMap::new()),
            last_template_id: AtomicI64::new(0),
        }
    }

    fn templates(&self) -> Result<MutexGuard<'_, BTreeMap<i64, ReportTemplate>>> {
        self.templates
            .lock()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .read()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, EmbeddingRecord>>> {
        self.records
            .write()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut store = self.write()?;
        for record in records {
            store.insert(record.chunk_id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        source_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let store = self.read()?;
        let candidates = store
            .values()
            .filter(|r| r.chunk.source_id == source_id)
            .cloned();
        Ok(rank(query_embedding, candidates, limit))
    }

    async fn get_by_source(&self, source_id: i64) -> Result<Vec<EmbeddingRecord>> {
        let store = self.read()?;
        let mut result: Vec<EmbeddingRecord> = store
            .values()
            .filter(|r| r.chunk.source_id == source_id)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.chunk.sequence_index);
        Ok(result)
    }

    async fn delete_by_source(&self, source_id: i64) -> Result<usize> {
        let mut store = self.write()?;
        let initial_len = store.len();
        store.retain(|_, r| r.chunk.source_id != source_id);
        Ok(initial_len - store.len())
    }

    async fn delete_from_sequence(&self, source_id: i64, first_stale: u32) -> Result<usize> {
        let mut store = self.write()?;
        let initial_len = store.len();
        store.retain(|_, r| {
            r.chunk.source_id != source_id || r.chunk.sequence_index < first_stale
        });
        Ok(initial_len - store.len())
    }

    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let store = self.read()?;
        let mut by_source: HashMap<i64, IndexedSource> = HashMap::new();

        for record in store.values() {
            let entry = by_source
                .entry(record.chunk.source_id)
                .or_insert_with(|| IndexedSource {
                    source_id: record.chunk.source_id,
                    chunk_count: 0,
                    total_duration_seconds: 0.0,
                    indexed_at: record.indexed_at,
                });

            entry.chunk_count += 1;
            if record.chunk.end_time > entry.total_duration_seconds {
                entry.total_duration_seconds = record.chunk.end_time;
            }
            if record.indexed_at > entry.indexed_at {
                entry.indexed_at = record.indexed_at;
            }
        }

        let mut sources: Vec<IndexedSource> = by_source.into_values().collect();
        sources.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(sources)
    }

    async fn record_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[async_trait]
impl TranscriptStore for MemoryVectorStore {
    async fn store_transcript(
        &self,
        source_id: i64,
        title: &str,
        transcript: &Transcript,
    ) -> Result<()> {
        let mut transcripts = self
            .transcripts
            .write()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        transcripts.insert(
            source_id,
            StoredTranscript {
                source_id,
                title: title.to_string(),
                transcript: transcript.clone(),
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_transcript(&self, source_id: i64) -> Result<Option<StoredTranscript>> {
        let transcripts = self
            .transcripts
            .read()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(transcripts.get(&source_id).cloned())
    }

    async fn list_transcripts(&self) -> Result<Vec<StoredTranscript>> {
        let transcripts = self
            .transcripts
            .read()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        let mut all: Vec<StoredTranscript> = transcripts.values().cloned().collect();
        all.sort_by(|a, b| b.stored_at.cmp(&a.stored_at));
        Ok(all)
    }
}

#[async_trait]
impl TemplateStore for MemoryVectorStore {
    async fn create_template(&self, template: &NewTemplate) -> Result<ReportTemplate> {
        let mut templates = self.templates()?;
        let id = self.last_template_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created = ReportTemplate {
            id,
            name: template.name.clone(),
            prompt_text: template.prompt_text.clone(),
            language: template.language.clone(),
            created_at: Utc::now(),
        };
        templates.insert(id, created.clone());
        Ok(created)
    }

    async fn get_template(&self, id: i64) -> Result<Option<ReportTemplate>> {
        Ok(self.templates()?.get(&id).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<ReportTemplate>> {
        Ok(self.templates()?.values().cloned().collect())
    }

    async fn update_template(
        &self,
        id: i64,
        update: TemplateUpdate,
    ) -> Result<Option<ReportTemplate>> {
        let mut templates = self.templates()?;
        Ok(templates.get_mut(&id).map(|template| {
            update.apply(template);
            template.clone()
        }))
    }

    async fn delete_template(&self, id: i64) -> Result<bool> {
        Ok(self.templates()?.remove(&id).is_some())
    }
}
