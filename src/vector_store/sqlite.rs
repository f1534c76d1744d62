//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and cosine distance is
//! computed in Rust. Queries only load the rows of one document.

use super::{
    rank, EmbeddingRecord, IndexedSource, NewTemplate, ReportTemplate, SearchResult,
    StoredTranscript, TemplateStore, TemplateUpdate, TranscriptStore, VectorStore,
};
use crate::chunking::TranscriptChunk;
use crate::error::{NotebookError, Result};
use crate::transcription::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS embeddings (
        chunk_id TEXT PRIMARY KEY,
        source_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        start_time REAL NOT NULL,
        end_time REAL NOT NULL,
        sequence_index INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_embeddings_source_id ON embeddings(source_id);

    CREATE TABLE IF NOT EXISTS transcripts (
        source_id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        transcript_json TEXT NOT NULL,
        duration_seconds REAL NOT NULL,
        stored_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS templates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        prompt_text TEXT NOT NULL,
        language TEXT,
        created_at TEXT NOT NULL
    );
"#;

const SELECT_RECORD: &str = r#"
    SELECT chunk_id, source_id, text, start_time, end_time, sequence_index,
           embedding, indexed_at
    FROM embeddings
    WHERE source_id = ?1
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| NotebookError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from the blob in `column`.
    fn bytes_to_embedding(column: usize, bytes: &[u8]) -> rusqlite::Result<Vec<f32>> {
        if bytes.len() % 4 != 0 {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                column,
                Type::Blob,
                format!("embedding blob of {} bytes is not a list of f32", bytes.len()).into(),
            ));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn parse_time(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EmbeddingRecord> {
        let embedding_bytes: Vec<u8> = row.get(6)?;
        let indexed_at: String = row.get(7)?;

        Ok(EmbeddingRecord {
            chunk_id: row.get(0)?,
            chunk: TranscriptChunk {
                source_id: row.get(1)?,
                text: row.get(2)?,
                start_time: row.get(3)?,
                end_time: row.get(4)?,
                sequence_index: row.get(5)?,
            },
            embedding: Self::bytes_to_embedding(6, &embedding_bytes)?,
            indexed_at: Self::parse_time(7, &indexed_at)?,
        })
    }

    fn row_to_template(row: &Row<'_>) -> rusqlite::Result<ReportTemplate> {
        let created_at: String = row.get(4)?;
        Ok(ReportTemplate {
            id: row.get(0)?,
            name: row.get(1)?,
            prompt_text: row.get(2)?,
            language: row.get(3)?,
            created_at: Self::parse_time(4, &created_at)?,
        })
    }

    fn load_template(conn: &Connection, id: i64) -> Result<Option<ReportTemplate>> {
        let result = conn.query_row(
            "SELECT id, name, prompt_text, language, created_at FROM templates WHERE id = ?1",
            params![id],
            Self::row_to_template,
        );
        match result {
            Ok(template) => Ok(Some(template)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_source(&self, source_id: i64, order: &str) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{} {}", SELECT_RECORD, order))?;
        let rows = stmt.query_map(params![source_id], Self::row_to_record)?;

        let records = rows.collect::<rusqlite::Result<Vec<EmbeddingRecord>>>()?;
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO embeddings
                (chunk_id, source_id, text, start_time, end_time, sequence_index,
                 embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    record.chunk_id,
                    record.chunk.source_id,
                    record.chunk.text,
                    record.chunk.start_time,
                    record.chunk.end_time,
                    record.chunk.sequence_index,
                    Self::embedding_to_bytes(&record.embedding),
                    record.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        source_id: i64,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self.load_source(source_id, "")?;
        let results = rank(query_embedding, candidates, limit);

        debug!("Found {} matching records", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn get_by_source(&self, source_id: i64) -> Result<Vec<EmbeddingRecord>> {
        self.load_source(source_id, "ORDER BY sequence_index")
    }

    #[instrument(skip(self))]
    async fn delete_by_source(&self, source_id: i64) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM embeddings WHERE source_id = ?1",
            params![source_id],
        )?;

        info!("Deleted {} records for source {}", deleted, source_id);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn delete_from_sequence(&self, source_id: i64, first_stale: u32) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM embeddings WHERE source_id = ?1 AND sequence_index >= ?2",
            params![source_id, first_stale],
        )?;
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_sources(&self) -> Result<Vec<IndexedSource>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT source_id, COUNT(*) as chunk_count,
                   MAX(end_time) as total_duration, MAX(indexed_at) as indexed_at
            FROM embeddings
            GROUP BY source_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let sources = stmt.query_map([], |row| {
            let indexed_at: String = row.get(3)?;
            Ok(IndexedSource {
                source_id: row.get(0)?,
                chunk_count: row.get(1)?,
                total_duration_seconds: row.get(2)?,
                indexed_at: Self::parse_time(3, &indexed_at)?,
            })
        })?;

        let result = sources.collect::<rusqlite::Result<Vec<IndexedSource>>>()?;
        Ok(result)
    }

    async fn record_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl TranscriptStore for SqliteVectorStore {
    async fn store_transcript(
        &self,
        source_id: i64,
        title: &str,
        transcript: &Transcript,
    ) -> Result<()> {
        let transcript_json = serde_json::to_string(transcript)?;
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (source_id, title, transcript_json, duration_seconds, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                source_id,
                title,
                transcript_json,
                transcript.duration_seconds(),
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Stored transcript for source {}", source_id);
        Ok(())
    }

    async fn get_transcript(&self, source_id: i64) -> Result<Option<StoredTranscript>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT title, transcript_json, stored_at FROM transcripts WHERE source_id = ?1",
            params![source_id],
            |row| {
                let title: String = row.get(0)?;
                let json: String = row.get(1)?;
                let stored_at: String = row.get(2)?;
                Ok((title, json, stored_at))
            },
        );

        match result {
            Ok((title, json, stored_at)) => Ok(Some(StoredTranscript {
                source_id,
                title,
                transcript: serde_json::from_str(&json)?,
                stored_at: Self::parse_time(2, &stored_at)?,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_transcripts(&self) -> Result<Vec<StoredTranscript>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, title, transcript_json, stored_at FROM transcripts ORDER BY stored_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let source_id: i64 = row.get(0)?;
            let title: String = row.get(1)?;
            let json: String = row.get(2)?;
            let stored_at: String = row.get(3)?;
            Ok((source_id, title, json, stored_at))
        })?;

        let mut transcripts = Vec::new();
        for row in rows {
            let (source_id, title, json, stored_at) = row?;
            transcripts.push(StoredTranscript {
                source_id,
                title,
                transcript: serde_json::from_str(&json)?,
                stored_at: Self::parse_time(3, &stored_at)?,
            });
        }
        Ok(transcripts)
    }
}

#[async_trait]
impl TemplateStore for SqliteVectorStore {
    async fn create_template(&self, template: &NewTemplate) -> Result<ReportTemplate> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO templates (name, prompt_text, language, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                template.name,
                template.prompt_text,
                template.language,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        info!("Created template {} ({})", id, template.name);
        Self::load_template(&conn, id)?
            .ok_or_else(|| NotebookError::VectorStore(format!("Template {} vanished", id)))
    }

    async fn get_template(&self, id: i64) -> Result<Option<ReportTemplate>> {
        let conn = self.lock()?;
        Self::load_template(&conn, id)
    }

    async fn list_templates(&self) -> Result<Vec<ReportTemplate>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, prompt_text, language, created_at FROM templates ORDER BY id",
        )?;
        let templates = stmt
            .query_map([], Self::row_to_template)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(templates)
    }

    async fn update_template(
        &self,
        id: i64,
        update: TemplateUpdate,
    ) -> Result<Option<ReportTemplate>> {
        let conn = self.lock()?;
        let Some(mut template) = Self::load_template(&conn, id)? else {
            return Ok(None);
        };
        update.apply(&mut template);

        conn.execute(
            "UPDATE templates SET name = ?1, prompt_text = ?2, language = ?3 WHERE id = ?4",
            params![template.name, template.prompt_text, template.language, id],
        )?;
        Ok(Some(template))
    }

    async fn delete_template(&self, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM templates WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::TranscriptSegment;

    fn record(source_id: i64, index: u32, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord::new(
            TranscriptChunk {
                source_id,
                text: format!("source {} chunk {}", source_id, index),
                start_time: index as f64 * 10.0,
                end_time: index as f64 * 10.0 + 10.0,
                sequence_index: index,
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        store
            .upsert_batch(&[
                record(1, 0, vec![1.0, 0.0, 0.0]),
                record(1, 1, vec![0.0, 1.0, 0.0]),
                record(2, 0, vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let sources = store.list_sources().await.unwrap();
        assert_eq!(sources.len(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 1, 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.record.chunk.source_id == 1));
        assert_eq!(results[0].record.chunk_id, "1_0");
        assert!(results[0].distance.abs() < 0.001);

        let deleted = store.delete_by_source(1).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_chunk_id() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.upsert_batch(&[record(3, 0, vec![1.0, 0.0])]).await.unwrap();
        store.upsert_batch(&[record(3, 0, vec![0.0, 1.0])]).await.unwrap();

        let records = store.get_by_source(3).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].embedding, vec![0.0f32, 1.0]);
    }

    #[tokio::test]
    async fn test_delete_from_sequence() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let records: Vec<_> = (0..3).map(|i| record(4, i, vec![1.0])).collect();
        store.upsert_batch(&records).await.unwrap();

        assert_eq!(store.delete_from_sequence(4, 1).await.unwrap(), 2);
        let left = store.get_by_source(4).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].chunk_id, "4_0");
    }

    #[tokio::test]
    async fn test_undecodable_rows_are_errors() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store.upsert_batch(&[record(5, 0, vec![1.0, 0.0])]).await.unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO embeddings VALUES ('5_1', 5, 'torn', 10.0, 20.0, 1, X'0102', ?1)",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        let err = store.get_by_source(5).await.unwrap_err();
        assert!(matches!(err, NotebookError::Database(_)));
        assert!(store.search(&[1.0, 0.0], 5, 3).await.is_err());

        let conn = store.lock().unwrap();
        conn.execute("DELETE FROM embeddings WHERE chunk_id = '5_1'", []).unwrap();
        conn.execute(
            "UPDATE embeddings SET indexed_at = 'yesterday' WHERE chunk_id = '5_0'",
            [],
        )
        .unwrap();
        drop(conn);

        assert!(store.get_by_source(5).await.is_err());
        assert!(store.list_sources().await.is_err());
    }

    #[tokio::test]
    async fn test_bad_transcript_rows_are_errors() {
        let store = SqliteVectorStore::in_memory().unwrap();
        let transcript = Transcript::new(vec![TranscriptSegment::new(0.0, 1.0, "ok")]);
        store.store_transcript(1, "Good", &transcript).await.unwrap();
        store.store_transcript(2, "Bad", &transcript).await.unwrap();

        // A blob where text belongs.
        store
            .lock()
            .unwrap()
            .execute("UPDATE transcripts SET title = X'00FF' WHERE source_id = 2", [])
            .unwrap();
        assert!(store.list_transcripts().await.is_err());

        store
            .lock()
            .unwrap()
            .execute(
                "UPDATE transcripts SET title = 'Bad', stored_at = 'soon' WHERE source_id = 2",
                [],
            )
            .unwrap();
        assert!(store.list_transcripts().await.is_err());
        assert!(store.get_transcript(2).await.is_err());
        assert!(store.get_transcript(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_templates_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");

        let id = {
            let store = SqliteVectorStore::new(&path).unwrap();
            let created = store
                .create_template(&NewTemplate {
                    name: "Minutes".to_string(),
                    prompt_text: "Write formal minutes.".to_string(),
                    language: Some("French".to_string()),
                })
                .await
                .unwrap();
            store
                .update_template(
                    created.id,
                    TemplateUpdate {
                        prompt_text: Some("Write short minutes.".to_string()),
                        ..TemplateUpdate::default()
                    },
                )
                .await
                .unwrap();
            created.id
        };

        let store = SqliteVectorStore::new(&path).unwrap();
        let template = store.get_template(id).await.unwrap().unwrap();
        assert_eq!(template.name, "Minutes");
        assert_eq!(template.prompt_text, "Write short minutes.");
        assert_eq!(template.language.as_deref(), Some("French"));
        assert_eq!(store.list_templates().await.unwrap().len(), 1);

        assert!(store.delete_template(id).await.unwrap());
        assert!(store.get_template(id).await.unwrap().is_none());
        assert!(store
            .update_template(id, TemplateUpdate::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_source_is_empty() {
        let store = SqliteVectorStore::in_memory().unwrap();
        assert!(store.search(&[1.0], 99, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::new(&dir.path().join("db/vectors.db")).unwrap();

        let transcript = Transcript::new(vec![TranscriptSegment::new(0.0, 4.0, "Hello there")])
            .with_language("en");
        store.store_transcript(7, "Greeting", &transcript).await.unwrap();

        let stored = store.get_transcript(7).await.unwrap().unwrap();
        assert_eq!(stored.title, "Greeting");
        assert_eq!(stored.transcript.text, "Hello there");
        assert!(store.get_transcript(8).await.unwrap().is_none());
        assert_eq!(store.list_transcripts().await.unwrap().len(), 1);
    }
}
