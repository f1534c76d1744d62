//! Prompt templates for the generation pipelines.
//!
//! Prompts can be customized by placing a `generation.toml` file in the
//! custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"));

/// Collection of all prompt templates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub generation: GenerationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Templates for summarize, overview, report and ask.
///
/// Available placeholders: `{{language}}`, `{{text}}`, `{{template}}`,
/// `{{context}}` and `{{question}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    pub summary: String,
    pub overview: String,
    pub report: String,
    pub query: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            summary: r#"Please provide a concise summary of the key points from the following text. Use bullet points for the main ideas.

Write your summary in {{language}}.

---

{{text}}"#
                .to_string(),

            overview: r#"Generate a narrative overview of the following text. Write it as a series of well-written paragraphs with concatenated ideas, suitable for a short audio briefing. Do not use bullet points or numbered lists.

Write your overview in {{language}}.

---

{{text}}"#
                .to_string(),

            report: "Write your response in {{language}}.\n\n{{template}}\n\n---\n\n{{text}}"
                .to_string(),

            query: "Based ONLY on the following context, answer the user's question.\n\nCONTEXT:\n{{context}}\n\nQUESTION:\n{{question}}"
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());
            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a template in a single pass.
    ///
    /// Substituted values are not scanned again, and unknown placeholders
    /// are left as they are.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render with the config variables underneath the provided ones.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
