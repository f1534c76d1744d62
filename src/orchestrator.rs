//! Notebook pipelines.
//!
//! Coordinates ingest (transcript → chunks → embedding index) and the
//! generation pipelines that route prompts through the model router.

use crate::chunking::{SegmentChunker, TranscriptChunk};
use crate::config::{Prompts, Settings};
use crate::credentials::CredentialStore;
use crate::discovery::{DiscoveryAggregator, DiscoveryResult};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{NotebookError, Result};
use crate::export::{self, ContentKind, Export, ExportFormat, ExportRequest};
use crate::provider::{build_adapters, ProviderAdapter};
use crate::rag::{EmbeddingIndex, PromptBuilder};
use crate::registry::ModelRegistry;
use crate::router::Router;
use crate::transcription::{Transcriber, Transcript, TranscriptFile};
use crate::vector_store::{
    NewTemplate, ReportTemplate, SqliteVectorStore, StoredTranscript, TemplateStore,
    TemplateUpdate, TranscriptStore, VectorStore,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Returned by `ask` when retrieval finds nothing.
pub const NO_CONTEXT_ANSWER: &str = "Could not find relevant information.";

/// Result of ingesting one document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub source_id: i64,
    pub title: String,
    pub chunks_indexed: usize,
}

/// Generated text together with the prompt that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub text: String,
    pub prompt: String,
}

/// A grounded answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Chunks the answer was grounded on, nearest first.
    pub citations: Vec<TranscriptChunk>,
    /// Absent when nothing was retrieved and no model was called.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// The notebook backend.
pub struct Notebook {
    settings: Settings,
    router: Arc<Router>,
    discovery: Arc<DiscoveryAggregator>,
    index: EmbeddingIndex,
    transcripts: Arc<dyn TranscriptStore>,
    templates: Arc<dyn TemplateStore>,
    transcriber: Arc<dyn Transcriber>,
    chunker: SegmentChunker,
    prompts: PromptBuilder,
}

impl Notebook {
    /// Create a notebook with components built from settings.
    pub fn new(settings: Settings, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        settings.providers.validate()?;

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let adapters = build_adapters(&settings, credentials.clone());
        let embedder = create_embedder(&settings.embedding, credentials)?;
        let store = Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?);

        Ok(Self::with_components(
            settings, prompts, adapters, embedder, store,
        ))
    }

    /// Create a notebook with custom components.
    pub fn with_components<S>(
        settings: Settings,
        prompts: Prompts,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        embedder: Arc<dyn Embedder>,
        store: Arc<S>,
    ) -> Self
    where
        S: VectorStore + TranscriptStore + TemplateStore + 'static,
    {
        let router = Arc::new(Router::new(ModelRegistry::builtin(), adapters.clone()));
        let discovery = Arc::new(DiscoveryAggregator::new(adapters));
        let vector_store: Arc<dyn VectorStore> = store.clone();
        let transcripts: Arc<dyn TranscriptStore> = store.clone();
        let chunker = SegmentChunker::new(settings.chunking.max_chunk_chars);

        Self {
            router,
            discovery,
            index: EmbeddingIndex::new(vector_store, embedder),
            transcripts,
            templates: store,
            transcriber: Arc::new(TranscriptFile::new()),
            chunker,
            prompts: PromptBuilder::new(prompts),
            settings,
        }
    }

    /// Replace the transcription service used by `ingest_file`.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> Arc<Router> {
        self.router.clone()
    }

    pub fn discovery(&self) -> Arc<DiscoveryAggregator> {
        self.discovery.clone()
    }

    /// Discover models on every provider and make them routable.
    pub async fn discover_models(&self) -> DiscoveryResult {
        let result = self.discovery.discover_all().await;
        self.router.register_discovered(&result.models);
        result
    }

    /// Transcribe a media file and ingest it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn ingest_file(
        &self,
        source_id: i64,
        path: &Path,
        title: Option<&str>,
    ) -> Result<IngestResult> {
        let transcript = self.transcriber.transcribe(path).await?;
        let title = match title {
            Some(t) => t.to_string(),
            None => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("Source {}", source_id)),
        };
        self.ingest(source_id, &title, &transcript).await
    }

    /// Chunk a transcript, index the chunks and store the transcript.
    ///
    /// Re-ingesting a source replaces its earlier chunks. When indexing
    /// fails the source keeps its previous transcript and index.
    #[instrument(skip(self, transcript), fields(segments = transcript.segments.len()))]
    pub async fn ingest(
        &self,
        source_id: i64,
        title: &str,
        transcript: &Transcript,
    ) -> Result<IngestResult> {
        let chunks = self.chunker.chunk(source_id, &transcript.segments);
        info!("Created {} chunks for source {}", chunks.len(), source_id);

        let chunks_indexed = self.index.replace(source_id, &chunks).await?;
        self.transcripts
            .store_transcript(source_id, title, transcript)
            .await?;

        Ok(IngestResult {
            source_id,
            title: title.to_string(),
            chunks_indexed,
        })
    }

    /// Bullet-point summary of a source.
    #[instrument(skip(self))]
    pub async fn summarize(&self, source_id: i64, model_key: Option<&str>) -> Result<Generated> {
        let text = self.full_text(source_id).await?;
        let prompt = self.prompts.summary(&text);
        self.generate(model_key, prompt).await
    }

    /// Narrative overview of a source, suitable for an audio briefing.
    #[instrument(skip(self))]
    pub async fn overview(&self, source_id: i64, model_key: Option<&str>) -> Result<Generated> {
        let text = self.full_text(source_id).await?;
        let prompt = self.prompts.overview(&text);
        self.generate(model_key, prompt).await
    }

    /// Apply a report template to a source.
    #[instrument(skip(self, template))]
    pub async fn report(
        &self,
        source_id: i64,
        template: &str,
        model_key: Option<&str>,
    ) -> Result<Generated> {
        if template.trim().is_empty() {
            return Err(NotebookError::InvalidInput(
                "Report template is empty".to_string(),
            ));
        }
        let text = self.full_text(source_id).await?;
        let prompt = self.prompts.report(template, &text);
        self.generate(model_key, prompt).await
    }

    /// Apply a stored template to a source.
    #[instrument(skip(self))]
    pub async fn report_with_template(
        &self,
        source_id: i64,
        template_id: i64,
        model_key: Option<&str>,
    ) -> Result<Generated> {
        let template = self.template(template_id).await?;
        self.report_from(source_id, &template, model_key).await
    }

    async fn report_from(
        &self,
        source_id: i64,
        template: &ReportTemplate,
        model_key: Option<&str>,
    ) -> Result<Generated> {
        let text = self.full_text(source_id).await?;
        let language = template
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty());
        let prompt = self.prompts.report_in(&template.prompt_text, &text, language);
        self.generate(model_key, prompt).await
    }

    /// Answer a question from the source's most relevant chunks.
    #[instrument(skip(self, question))]
    pub async fn ask(
        &self,
        source_id: i64,
        question: &str,
        model_key: Option<&str>,
    ) -> Result<Answer> {
        let citations = self
            .index
            .query(question, source_id, self.settings.rag.max_context_chunks)
            .await?;

        if citations.is_empty() {
            warn!("No indexed chunks matched in source {}", source_id);
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                citations,
                prompt: None,
            });
        }

        let prompt = self.prompts.query(question, &citations);
        let generated = self.generate(model_key, prompt).await?;
        Ok(Answer {
            answer: generated.text,
            citations,
            prompt: Some(generated.prompt),
        })
    }

    /// Stored sources, newest first.
    pub async fn sources(&self) -> Result<Vec<StoredTranscript>> {
        self.transcripts.list_transcripts().await
    }

    /// One stored source.
    pub async fn source(&self, source_id: i64) -> Result<StoredTranscript> {
        self.transcripts
            .get_transcript(source_id)
            .await?
            .ok_or_else(|| NotebookError::NotFound(format!("Source {}", source_id)))
    }

    /// Stored report templates in id order.
    pub async fn templates(&self) -> Result<Vec<ReportTemplate>> {
        self.templates.list_templates().await
    }

    pub async fn template(&self, id: i64) -> Result<ReportTemplate> {
        self.templates
            .get_template(id)
            .await?
            .ok_or_else(|| NotebookError::NotFound(format!("Template {}", id)))
    }

    pub async fn create_template(&self, template: &NewTemplate) -> Result<ReportTemplate> {
        if template.name.trim().is_empty() || template.prompt_text.trim().is_empty() {
            return Err(NotebookError::InvalidInput(
                "A template needs a name and prompt text".to_string(),
            ));
        }
        self.templates.create_template(template).await
    }

    pub async fn update_template(&self, id: i64, update: TemplateUpdate) -> Result<ReportTemplate> {
        self.templates
            .update_template(id, update)
            .await?
            .ok_or_else(|| NotebookError::NotFound(format!("Template {}", id)))
    }

    pub async fn delete_template(&self, id: i64) -> Result<()> {
        if self.templates.delete_template(id).await? {
            Ok(())
        } else {
            Err(NotebookError::NotFound(format!("Template {}", id)))
        }
    }

    /// Render a source's transcript or generated text as a download.
    ///
    /// Provided content is exported as given; otherwise it is generated.
    #[instrument(skip(self, request), fields(source_id = request.source_id, kind = %request.content_type))]
    pub async fn export(&self, request: &ExportRequest) -> Result<Export> {
        let source = self.source(request.source_id).await?;
        let kind = request.content_type;
        let format = request.format;
        let model_key = request.model_key.as_deref();

        let template = match kind {
            ContentKind::Report => {
                let id = request.template_id.ok_or_else(|| {
                    NotebookError::InvalidInput(
                        "Template ID is required for report export".to_string(),
                    )
                })?;
                Some(self.template(id).await?)
            }
            _ => None,
        };
        let file_name = export::file_name(
            kind,
            request.source_id,
            format,
            template.as_ref().map(|t| t.name.as_str()),
        );

        let provided = request.content.as_deref().filter(|c| !c.trim().is_empty());
        let content = match (provided, kind) {
            (Some(content), _) => export::format_content(content, kind, format),
            (None, ContentKind::Transcript) => match format {
                ExportFormat::Markdown => export::transcript_markdown(&source.transcript),
                ExportFormat::Text => export::transcript_text(&source.transcript),
            },
            (None, ContentKind::Summary) => {
                let summary = self.summarize(request.source_id, model_key).await?;
                export::format_content(&summary.text, kind, format)
            }
            (None, ContentKind::Overview) => {
                let overview = self.overview(request.source_id, model_key).await?;
                export::format_content(&overview.text, kind, format)
            }
            (None, ContentKind::Report) => {
                let template = template.as_ref().ok_or_else(|| {
                    NotebookError::InvalidInput("Report export needs a template".to_string())
                })?;
                let report = self.report_from(request.source_id, template, model_key).await?;
                export::format_report(&report.text, &template.name, format)
            }
        };

        info!("Exported {} for source {}", file_name, request.source_id);
        Ok(Export {
            file_name,
            format,
            content,
        })
    }

    async fn full_text(&self, source_id: i64) -> Result<String> {
        Ok(self.source(source_id).await?.transcript.full_text())
    }

    async fn generate(&self, model_key: Option<&str>, prompt: String) -> Result<Generated> {
        let key = model_key.unwrap_or(self.settings.generation.default_model.as_str());
        let text = self.router.route(key, &prompt).await?;
        Ok(Generated { text, prompt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        ConnectionStatus, ModelDescriptor, Provider, ProviderError, ProviderErrorKind,
        ProviderResult,
    };
    use crate::transcription::TranscriptSegment;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct Echo {
        prompts: Mutex<Vec<String>>,
        down: bool,
    }

    #[async_trait]
    impl ProviderAdapter for Echo {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }

        async fn list_models(&self) -> ProviderResult<Vec<ModelDescriptor>> {
            Ok(vec![ModelDescriptor::new(
                "ollama_phi3",
                "Ollama: Phi3",
                Provider::Ollama,
                "phi3:latest",
            )])
        }

        async fn generate(&self, backend_model_id: &str, prompt: &str) -> ProviderResult<String> {
            if self.down {
                return Err(ProviderError::new(
                    Provider::Ollama,
                    ProviderErrorKind::Unreachable,
                    "connection refused",
                ));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(format!("[{}]", backend_model_id))
        }

        async fn test_connection(&self) -> ConnectionStatus {
            ConnectionStatus::ok(Provider::Ollama, "ok")
        }
    }

    /// One dimension per keyword so retrieval is predictable.
    #[derive(Default)]
    struct KeywordEmbedder {
        batch_down: AtomicBool,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let text = text.to_lowercase();
            Ok(["budget", "hiring", "launch"]
                .iter()
                .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
                .collect())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.batch_down.load(Ordering::SeqCst) {
                return Err(NotebookError::Embedding("service unavailable".to_string()));
            }
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    fn notebook(down: bool) -> (Notebook, Arc<Echo>) {
        notebook_with(down, Arc::new(KeywordEmbedder::default()))
    }

    fn notebook_with(down: bool, embedder: Arc<KeywordEmbedder>) -> (Notebook, Arc<Echo>) {
        let echo = Arc::new(Echo {
            prompts: Mutex::new(Vec::new()),
            down,
        });
        let mut settings = Settings::default();
        settings.chunking.max_chunk_chars = 20;
        settings.rag.max_context_chunks = 1;

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![echo.clone()];
        let notebook = Notebook::with_components(
            settings,
            Prompts::default(),
            adapters,
            embedder,
            Arc::new(MemoryVectorStore::new()),
        );
        (notebook, echo)
    }

    fn transcript() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment::new(0.0, 4.0, "We reviewed the budget today."),
            TranscriptSegment::new(4.0, 9.0, "Hiring starts in spring."),
            TranscriptSegment::new(9.0, 12.0, "The launch is in May."),
        ])
    }

    #[tokio::test]
    async fn test_ingest_and_ask() {
        let (notebook, echo) = notebook(false);
        let ingested = notebook.ingest(1, "Standup", &transcript()).await.unwrap();
        assert_eq!(ingested.chunks_indexed, 3);

        let answer = notebook.ask(1, "When does hiring start?", None).await.unwrap();
        assert_eq!(answer.answer, "[mistral]");
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].text, "Hiring starts in spring.");

        let prompt = answer.prompt.unwrap();
        assert!(prompt.contains("CONTEXT:\nHiring starts in spring."));
        assert_eq!(echo.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reingest_keeps_previous_index() {
        let embedder = Arc::new(KeywordEmbedder::default());
        let (notebook, _) = notebook_with(false, embedder.clone());
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        embedder.batch_down.store(true, Ordering::SeqCst);
        let replacement = Transcript::new(vec![TranscriptSegment::new(0.0, 3.0, "Launch moved.")]);
        let err = notebook.ingest(1, "Retake", &replacement).await.unwrap_err();
        assert!(matches!(err, NotebookError::Embedding(_)));

        let answer = notebook.ask(1, "When does hiring start?", None).await.unwrap();
        assert_eq!(answer.citations[0].text, "Hiring starts in spring.");
        let stored = notebook.source(1).await.unwrap();
        assert_eq!(stored.title, "Standup");
        assert_eq!(stored.transcript.segments.len(), 3);
    }

    #[tokio::test]
    async fn test_shorter_reingest_drops_old_chunks() {
        let (notebook, _) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        let shorter = Transcript::new(vec![TranscriptSegment::new(0.0, 3.0, "Budget is final.")]);
        let ingested = notebook.ingest(1, "Standup", &shorter).await.unwrap();
        assert_eq!(ingested.chunks_indexed, 1);

        let answer = notebook.ask(1, "When does hiring start?", None).await.unwrap();
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].text, "Budget is final.");
    }

    #[tokio::test]
    async fn test_ask_without_context() {
        let (notebook, echo) = notebook(false);
        let answer = notebook.ask(42, "Anything?", None).await.unwrap();

        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.citations.is_empty());
        assert!(answer.prompt.is_none());
        assert!(echo.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_empty_transcript() {
        let (notebook, _) = notebook(false);
        let ingested = notebook
            .ingest(3, "Silence", &Transcript::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(ingested.chunks_indexed, 0);
        assert_eq!(notebook.sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_summarize_and_report() {
        let (notebook, echo) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        let summary = notebook.summarize(1, None).await.unwrap();
        assert_eq!(summary.text, "[mistral]");
        assert!(summary.prompt.contains("Write your summary in English."));

        let report = notebook
            .report(1, "List the dates.", Some("ollama_llama3"))
            .await
            .unwrap();
        assert_eq!(report.text, "[llama3]");
        assert!(report.prompt.starts_with("Write your response in English.\n\nList the dates.\n\n---\n\n"));
        assert_eq!(echo.prompts.lock().unwrap().len(), 2);
    }

    fn dates_template() -> NewTemplate {
        NewTemplate {
            name: "Key dates".to_string(),
            prompt_text: "List the dates.".to_string(),
            language: Some("Spanish".to_string()),
        }
    }

    #[tokio::test]
    async fn test_report_with_stored_template() {
        let (notebook, _) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();
        let template = notebook.create_template(&dates_template()).await.unwrap();

        let report = notebook
            .report_with_template(1, template.id, None)
            .await
            .unwrap();
        assert_eq!(report.text, "[mistral]");
        assert!(report
            .prompt
            .starts_with("Write your response in Spanish.\n\nList the dates.\n\n---\n\n"));

        let err = notebook.report_with_template(1, 99, None).await.unwrap_err();
        assert!(matches!(err, NotebookError::NotFound(_)));

        let blank = NewTemplate {
            name: " ".to_string(),
            ..dates_template()
        };
        let err = notebook.create_template(&blank).await.unwrap_err();
        assert!(matches!(err, NotebookError::InvalidInput(_)));
        assert!(matches!(
            notebook.delete_template(99).await.unwrap_err(),
            NotebookError::NotFound(_)
        ));
    }

    fn export_request(kind: ContentKind, format: ExportFormat) -> ExportRequest {
        ExportRequest {
            source_id: 1,
            content_type: kind,
            format,
            template_id: None,
            model_key: None,
            content: None,
        }
    }

    #[tokio::test]
    async fn test_export_generates_missing_content() {
        let (notebook, _) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        let transcript_md = notebook
            .export(&export_request(ContentKind::Transcript, ExportFormat::Markdown))
            .await
            .unwrap();
        assert_eq!(transcript_md.file_name, "transcript_1.md");
        assert_eq!(transcript_md.content_type(), "text/markdown; charset=utf-8");
        assert!(transcript_md
            .content
            .starts_with("# Transcription\n\n**[00:00]** We reviewed the budget today.\n**[00:04]**"));

        let summary = notebook
            .export(&export_request(ContentKind::Summary, ExportFormat::Text))
            .await
            .unwrap();
        assert_eq!(summary.file_name, "summary_1.txt");
        assert_eq!(summary.content, "[mistral]");

        let template = notebook.create_template(&dates_template()).await.unwrap();
        let mut request = export_request(ContentKind::Report, ExportFormat::Markdown);
        let err = notebook.export(&request).await.unwrap_err();
        assert!(matches!(err, NotebookError::InvalidInput(_)));

        request.template_id = Some(template.id);
        let report = notebook.export(&request).await.unwrap();
        assert_eq!(report.file_name, "report_Keydates_1.md");
        assert_eq!(report.content, "# Report: Key dates\n\n[mistral]");
        assert_eq!(report.disposition(), "attachment; filename=\"report_Keydates_1.md\"");
    }

    #[tokio::test]
    async fn test_export_provided_content() {
        let (notebook, echo) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        let mut request = export_request(ContentKind::Overview, ExportFormat::Markdown);
        request.content = Some("  What the screen shows.\n".to_string());
        let exported = notebook.export(&request).await.unwrap();
        assert_eq!(exported.content, "# Overview\n\nWhat the screen shows.");
        assert!(echo.prompts.lock().unwrap().is_empty());

        request.source_id = 9;
        let err = notebook.export(&request).await.unwrap_err();
        assert!(matches!(err, NotebookError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_source() {
        let (notebook, _) = notebook(false);
        let err = notebook.overview(9, None).await.unwrap_err();
        assert!(matches!(err, NotebookError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_inline() {
        let (notebook, _) = notebook(true);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();

        let overview = notebook.overview(1, None).await.unwrap();
        assert!(overview.text.starts_with("Error: Could not get a response from ollama_mistral."));
    }

    #[tokio::test]
    async fn test_discovered_models_route() {
        let (notebook, _) = notebook(false);
        notebook.ingest(1, "Standup", &transcript()).await.unwrap();
        assert!(notebook.summarize(1, Some("ollama_phi3")).await.is_err());

        let discovered = notebook.discover_models().await;
        assert_eq!(discovered.count(), 1);
        let summary = notebook.summarize(1, Some("ollama_phi3")).await.unwrap();
        assert_eq!(summary.text, "[phi3:latest]");
    }
}
