//! Notebook - transcript retrieval and multi-provider LLM routing
//!
//! The backend of a local "notebook" application: transcripts are chunked
//! and indexed for retrieval, and summaries, overviews, reports and grounded
//! answers are generated by whichever language model the user picks.
//!
//! # Overview
//!
//! - Discover the models usable right now across Ollama, OpenAI, Anthropic
//!   and Google Gemini, with one actionable message per failing provider
//! - Route a prompt to the provider behind a model key, degrading to an
//!   inline error message instead of failing the pipeline
//! - Chunk timed transcript segments and answer questions from the chunks
//!   nearest to the query, scoped to one document
//!
//! # Architecture
//!
//! - `provider` - Provider adapters and the shared error taxonomy
//! - `registry` - Model key to backend model table
//! - `discovery` - Live model discovery across providers
//! - `router` - Generation routing
//! - `chunking` - Transcript chunking
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `rag` - Embedding index and prompt assembly
//! - `orchestrator` - Ingest and generation pipelines
//! - `export` - Markdown and plain-text downloads
//!
//! # Example
//!
//! ```rust,no_run
//! use notebook::config::Settings;
//! use notebook::credentials::ConfigCredentials;
//! use notebook::orchestrator::Notebook;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let notebook = Notebook::new(settings, Arc::new(ConfigCredentials::new()))?;
//!
//!     let discovered = notebook.discover_models().await;
//!     println!("{} models available", discovered.count());
//!
//!     let answer = notebook.ask(1, "What was decided?", None).await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod discovery;
pub mod embedding;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod provider;
pub mod rag;
pub mod registry;
pub mod router;
pub mod transcription;
pub mod vector_store;

pub use error::{NotebookError, Result};
