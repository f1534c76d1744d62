//! Prompt assembly and language detection.

use crate::chunking::TranscriptChunk;
use crate::config::Prompts;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Characters inspected by [`detect_language`].
const SAMPLE_CHARS: usize = 500;

/// Minimum indicator hits before trusting a guess.
const MIN_INDICATORS: usize = 3;

/// Languages the generation prompts can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Spanish,
    French,
    German,
    English,
}

impl Language {
    /// Candidates in tie-break order.
    const ALL: [Language; 4] = [
        Language::Spanish,
        Language::French,
        Language::German,
        Language::English,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::German => "German",
            Language::English => "English",
        }
    }

    fn indicators(&self) -> &'static [&'static str] {
        match self {
            Language::Spanish => &[
                "el ", "la ", "los ", "las ", "de ", "que ", "es ", "un ", "una ", "por ",
                "para ", "con ", "en ", "del ",
            ],
            Language::French => &[
                "le ", "la ", "les ", "de ", "des ", "un ", "une ", "je ", "tu ", "il ",
                "nous ", "vous ", "ils ", "et ", "est ", "dans ",
            ],
            Language::German => &[
                "der ", "die ", "das ", "den ", "dem ", "des ", "ein ", "eine ", "und ", "ich ",
                "ist ", "nicht ", "mit ", "für ",
            ],
            Language::English => &[
                "the ", "a ", "an ", "is ", "are ", "was ", "were ", "and ", "or ", "but ",
                "in ", "on ", "at ", "to ", "for ",
            ],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Guess the language of a text from common short words.
///
/// Only the first 500 characters are inspected. Substring hits are counted
/// per language; the highest count wins, earlier languages win ties, and
/// fewer than three hits falls back to English.
pub fn detect_language(text: &str) -> Language {
    let sample: String = text.chars().take(SAMPLE_CHARS).collect::<String>().to_lowercase();

    let mut best = Language::English;
    let mut best_count = 0;
    for language in Language::ALL {
        let count: usize = language
            .indicators()
            .iter()
            .map(|indicator| sample.matches(indicator).count())
            .sum();
        debug!("Language score {}: {}", language, count);
        if count > best_count {
            best = language;
            best_count = count;
        }
    }

    if best_count < MIN_INDICATORS {
        Language::English
    } else {
        best
    }
}

/// Builds the prompts handed to the router.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    prompts: Prompts,
}

impl PromptBuilder {
    pub fn new(prompts: Prompts) -> Self {
        Self { prompts }
    }

    /// Bullet-point summary in the text's language.
    pub fn summary(&self, full_text: &str) -> String {
        self.with_language(&self.prompts.generation.summary, full_text, None, None)
    }

    /// Narrative overview suitable for reading aloud.
    pub fn overview(&self, full_text: &str) -> String {
        self.with_language(&self.prompts.generation.overview, full_text, None, None)
    }

    /// A user-supplied report template applied to the full text.
    pub fn report(&self, template: &str, full_text: &str) -> String {
        self.report_in(template, full_text, None)
    }

    /// A report template, written in `language` instead of the detected one.
    pub fn report_in(&self, template: &str, full_text: &str, language: Option<&str>) -> String {
        self.with_language(
            &self.prompts.generation.report,
            full_text,
            Some(template),
            language,
        )
    }

    /// Question grounded in retrieved chunks, joined by `\n---\n`.
    pub fn query(&self, question: &str, chunks: &[TranscriptChunk]) -> String {
        let context = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");

        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context);
        vars.insert("question".to_string(), question.to_string());
        self.prompts
            .render_with_custom(&self.prompts.generation.query, &vars)
    }

    fn with_language(
        &self,
        template: &str,
        full_text: &str,
        report: Option<&str>,
        language: Option<&str>,
    ) -> String {
        let language = match language {
            Some(language) => language.to_string(),
            None => detect_language(full_text).name().to_string(),
        };
        let mut vars = HashMap::new();
        vars.insert("language".to_string(), language);
        vars.insert("text".to_string(), full_text.to_string());
        if let Some(report) = report {
            vars.insert("template".to_string(), report.to_string());
        }
        self.prompts.render_with_custom(template, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            source_id: 1,
            text: text.to_string(),
            start_time: 0.0,
            end_time: 1.0,
            sequence_index: index,
        }
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect_language("El perro de la casa es grande y los gatos son para ella."),
            Language::Spanish
        );
        assert_eq!(
            detect_language("Der Hund und die Katze sind nicht mit dem Auto gefahren."),
            Language::German
        );
        assert_eq!(
            detect_language("The cat is on the mat and the dog was in the yard."),
            Language::English
        );
        assert_eq!(
            detect_language("Nous avons des amis et je les vois dans le parc."),
            Language::French
        );
    }

    #[test]
    fn test_detect_language_defaults_to_english() {
        assert_eq!(detect_language(""), Language::English);
        assert_eq!(detect_language("Hola amigos"), Language::English);
    }

    #[test]
    fn test_detect_language_uses_prefix_only() {
        let text = format!("{}{}", "x".repeat(500), " el la los las de que es");
        assert_eq!(detect_language(&text), Language::English);
    }

    #[test]
    fn test_report_prompt() {
        let builder = PromptBuilder::default();
        let text = "The meeting is about the budget and the plan for the year.";
        assert_eq!(
            builder.report("Summarize action items.", text),
            format!(
                "Write your response in English.\n\nSummarize action items.\n\n---\n\n{}",
                text
            )
        );
        assert!(builder
            .report_in("Summarize action items.", text, Some("Italian"))
            .starts_with("Write your response in Italian.\n\nSummarize action items."));
    }

    #[test]
    fn test_summary_prompt_names_language() {
        let builder = PromptBuilder::default();
        let prompt = builder.summary("Der Bericht und die Zahlen sind nicht gut, das ist klar.");
        assert!(prompt.contains("Write your summary in German."));
        assert!(prompt.ends_with("das ist klar."));
    }

    #[test]
    fn test_query_prompt() {
        let builder = PromptBuilder::default();
        let prompt = builder.query("What?", &[chunk(0, "first"), chunk(1, "second")]);
        assert_eq!(
            prompt,
            "Based ONLY on the following context, answer the user's question.\n\n\
             CONTEXT:\nfirst\n---\nsecond\n\nQUESTION:\nWhat?"
        );
    }
}
