//! Configuration module.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{GenerationPrompts, Prompts};
pub use settings::{
    AnthropicSettings, ChunkingSettings, EmbeddingSettings, GeneralSettings, GenerationSettings,
    GoogleSettings, OllamaSettings, OpenAISettings, PromptSettings, ProvidersSettings,
    RagSettings, Settings, VectorStoreSettings,
};
