//! CLI module for the notebook backend.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Notebook - transcript Q&A and multi-provider model routing
///
/// Ingests transcripts, indexes them for retrieval, and generates summaries,
/// overviews, reports and grounded answers with local or cloud models.
#[derive(Parser, Debug)]
#[command(name = "notebook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "NOTEBOOK_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List models available across providers
    Models {
        /// Only query one provider (ollama, openai, anthropic, google)
        provider: Option<String>,
    },

    /// Test provider connections with a minimal real request
    Test {
        /// Only test one provider (ollama, openai, anthropic, google)
        provider: Option<String>,
    },

    /// Send a prompt straight to a model
    Generate {
        /// Prompt text
        prompt: String,

        /// Model key (e.g. ollama_mistral, claude_3_opus)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Ingest a transcript and index it for questions
    Ingest {
        /// Transcript JSON, or a media file with a .json sidecar
        path: String,

        /// Numeric id for the source document
        #[arg(short, long)]
        source_id: i64,

        /// Display title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Ask a question about one source
    Ask {
        /// Source document id
        source_id: i64,

        /// The question to ask
        question: String,

        /// Model key used to answer
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Summarize a source as bullet points
    Summarize {
        /// Source document id
        source_id: i64,

        /// Model key used to generate
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Write a narrative overview of a source
    Overview {
        /// Source document id
        source_id: i64,

        /// Model key used to generate
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Apply a report template to a source
    Report {
        /// Source document id
        source_id: i64,

        /// Report instructions, or @path to read them from a file
        #[arg(required_unless_present = "template_id")]
        template: Option<String>,

        /// Use a stored template instead of inline instructions
        #[arg(long, conflicts_with = "template")]
        template_id: Option<i64>,

        /// Model key used to generate
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage stored report templates
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Export a transcript or generated text to a file
    Export {
        /// Source document id
        source_id: i64,

        /// What to export (transcript, summary, overview, report)
        kind: String,

        /// File format (md or txt)
        #[arg(short, long, default_value = "md")]
        format: String,

        /// Stored template for report exports
        #[arg(long)]
        template_id: Option<i64>,

        /// Model key used to generate
        #[arg(short, long)]
        model: Option<String>,

        /// Directory to write the file to
        #[arg(short, long, default_value = ".")]
        output: String,
    },

    /// List ingested sources
    List,

    /// Start HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum TemplateAction {
    /// List stored templates
    List,

    /// Store a new template
    Add {
        /// Template name
        name: String,

        /// Report instructions, or @path to read them from a file
        prompt: String,

        /// Write reports in this language instead of the detected one
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Delete a stored template
    Remove {
        /// Template id
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration (secrets masked)
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "providers.openai.api_key")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let cli = Cli::try_parse_from([
            "notebook", "-vv", "report", "3", "@weekly.md", "--model", "claude_3_opus",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Report {
                source_id,
                template,
                template_id,
                model,
            } => {
                assert_eq!(source_id, 3);
                assert_eq!(template.as_deref(), Some("@weekly.md"));
                assert_eq!(template_id, None);
                assert_eq!(model.as_deref(), Some("claude_3_opus"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_report_needs_one_template() {
        assert!(Cli::try_parse_from(["notebook", "report", "3"]).is_err());
        assert!(Cli::try_parse_from(["notebook", "report", "3", "x", "--template-id", "2"]).is_err());

        let cli = Cli::try_parse_from(["notebook", "report", "3", "--template-id", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Report {
                template: None,
                template_id: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from(["notebook", "export", "5", "summary", "-f", "txt"]).unwrap();
        match cli.command {
            Commands::Export {
                source_id,
                kind,
                format,
                output,
                ..
            } => {
                assert_eq!(source_id, 5);
                assert_eq!(kind, "summary");
                assert_eq!(format, "txt");
                assert_eq!(output, ".");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ingest_requires_source_id() {
        assert!(Cli::try_parse_from(["notebook", "ingest", "talk.json"]).is_err());
    }
}
