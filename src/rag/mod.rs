//! Retrieval and prompt assembly for the generation pipelines.
//!
//! The index grounds answers in one document's chunks; the prompt builder
//! turns transcripts and retrieved chunks into the text handed to the router.

mod index;
mod prompt;

pub use index::EmbeddingIndex;
pub use prompt::{detect_language, Language, PromptBuilder};
