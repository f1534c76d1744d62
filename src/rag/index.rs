//! Embedding index over transcript chunks.

use crate::chunking::TranscriptChunk;
use crate::embedding::{check_dimensions, Embedder};
use crate::error::{NotebookError, Result};
use crate::vector_store::{EmbeddingRecord, VectorStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Stores chunk embeddings keyed by `{source_id}_{sequence_index}` and
/// answers nearest-neighbour queries scoped to one document.
pub struct EmbeddingIndex {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingIndex {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
        }
    }

    /// Embed and upsert chunks for a document.
    ///
    /// Re-adding the same sequence indices overwrites the earlier records.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn add(&self, source_id: i64, chunks: &[TranscriptChunk]) -> Result<usize> {
        if chunks.is_empty() {
            debug!("No chunks to index for source {}", source_id);
            return Ok(0);
        }

        if let Some(stray) = chunks.iter().find(|c| c.source_id != source_id) {
            return Err(NotebookError::InvalidInput(format!(
                "Chunk {} does not belong to source {}",
                stray.chunk_id(),
                source_id
            )));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(NotebookError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        check_dimensions(&embeddings, self.embedder.dimensions())?;

        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddingRecord::new(chunk, embedding))
            .collect();

        let count = self.vector_store.upsert_batch(&records).await?;
        info!("Indexed {} chunks for source {}", count, source_id);
        Ok(count)
    }

    /// Up to `k` chunks of one document, nearest first.
    #[instrument(skip(self, query_text))]
    pub async fn query(
        &self,
        query_text: &str,
        source_id: i64,
        k: usize,
    ) -> Result<Vec<TranscriptChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query_text).await?;
        check_dimensions(std::slice::from_ref(&query_embedding), self.embedder.dimensions())?;
        let results = self
            .vector_store
            .search(&query_embedding, source_id, k)
            .await?;

        debug!("Query matched {} chunks in source {}", results.len(), source_id);
        Ok(results.into_iter().map(|r| r.record.chunk).collect())
    }

    /// Make `chunks` the document's complete set of records.
    ///
    /// New records are written before stale ones are deleted, so a failed
    /// embedding leaves the previous index untouched.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn replace(&self, source_id: i64, chunks: &[TranscriptChunk]) -> Result<usize> {
        let count = self.add(source_id, chunks).await?;

        let first_stale = chunks
            .iter()
            .map(|c| c.sequence_index + 1)
            .max()
            .unwrap_or(0);
        let stale = self
            .vector_store
            .delete_from_sequence(source_id, first_stale)
            .await?;
        if stale > 0 {
            info!("Dropped {} stale chunks for source {}", stale, source_id);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;

    /// Bag-of-letters embedding: deterministic and good enough to rank.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0f32; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(v)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    fn chunk(source_id: i64, index: u32, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            source_id,
            text: text.to_string(),
            start_time: index as f64 * 10.0,
            end_time: index as f64 * 10.0 + 10.0,
            sequence_index: index,
        }
    }

    fn index() -> (EmbeddingIndex, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        (EmbeddingIndex::new(store.clone(), Arc::new(LetterEmbedder)), store)
    }

    #[tokio::test]
    async fn test_query_is_scoped_to_source() {
        let (index, _) = index();
        index
            .add(1, &[chunk(1, 0, "zzzz"), chunk(1, 1, "abc")])
            .await
            .unwrap();
        index.add(2, &[chunk(2, 0, "zzzz")]).await.unwrap();

        let hits = index.query("zzz", 1, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "zzzz");
        assert!(hits.iter().all(|c| c.source_id == 1));

        assert!(index.query("zzz", 3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let (index, store) = index();
        let chunks = [chunk(7, 0, "hello"), chunk(7, 1, "world")];

        index.add(7, &chunks).await.unwrap();
        let first = index.query("hello", 7, 5).await.unwrap();
        index.add(7, &chunks).await.unwrap();
        let second = index.query("hello", 7, 5).await.unwrap();

        assert_eq!(store.record_count().await.unwrap(), 2);
        let texts = |c: &[TranscriptChunk]| c.iter().map(|c| c.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&first), texts(&second));
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let (index, _) = index();
        assert_eq!(index.add(1, &[]).await.unwrap(), 0);
        assert!(index.query("anything", 1, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_chunks() {
        let (index, _) = index();
        let err = index.add(1, &[chunk(2, 0, "x")]).await.unwrap_err();
        assert!(matches!(err, NotebookError::InvalidInput(_)));
    }

    /// Returns vectors one component short.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; 25])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0; 25]).collect())
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensions() {
        let store = Arc::new(MemoryVectorStore::new());
        let short = EmbeddingIndex::new(store.clone(), Arc::new(ShortEmbedder));

        let err = short.add(1, &[chunk(1, 0, "abc")]).await.unwrap_err();
        assert!(matches!(err, NotebookError::Embedding(_)));
        assert_eq!(store.record_count().await.unwrap(), 0);

        let good = EmbeddingIndex::new(store.clone(), Arc::new(LetterEmbedder));
        good.add(1, &[chunk(1, 0, "abc")]).await.unwrap();
        assert!(short.query("abc", 1, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_replace_drops_stale_chunks() {
        let (index, store) = index();
        let long: Vec<_> = (0..4).map(|i| chunk(1, i, "old words")).collect();
        index.replace(1, &long).await.unwrap();
        index.add(2, &[chunk(2, 0, "other")]).await.unwrap();

        let count = index
            .replace(1, &[chunk(1, 0, "new"), chunk(1, 1, "words")])
            .await
            .unwrap();
        assert_eq!(count, 2);

        let texts: Vec<String> = store
            .get_by_source(1)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.chunk.text)
            .collect();
        assert_eq!(texts, ["new", "words"]);
        assert_eq!(store.get_by_source(2).await.unwrap().len(), 1);

        assert_eq!(index.replace(1, &[]).await.unwrap(), 0);
        assert!(store.get_by_source(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_limits_to_k() {
        let (index, _) = index();
        let chunks: Vec<_> = (0..5).map(|i| chunk(1, i, "same text")).collect();
        index.add(1, &chunks).await.unwrap();

        let hits = index.query("same text", 1, 3).await.unwrap();
        let order: Vec<u32> = hits.iter().map(|c| c.sequence_index).collect();
        assert_eq!(order, [0, 1, 2]);
    }
}
