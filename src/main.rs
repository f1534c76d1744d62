//! Notebook CLI entry point.

use anyhow::Result;
use clap::Parser;
use notebook::cli::{commands, Cli, Commands};
use notebook::config::Settings;
use notebook::credentials::{ConfigCredentials, CredentialStore};
use notebook::export::ExportRequest;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("notebook={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli
        .config
        .as_ref()
        .map(|p| Settings::expand_path(p))
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Keys are re-read from the same file on every provider call
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(ConfigCredentials::with_path(config_path.clone()));

    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Models { provider } => {
            commands::run_models(provider.as_deref(), settings, credentials).await?;
        }

        Commands::Test { provider } => {
            commands::run_test(provider.as_deref(), settings, credentials).await?;
        }

        Commands::Generate { prompt, model } => {
            commands::run_generate(prompt, model.as_deref(), settings, credentials).await?;
        }

        Commands::Ingest {
            path,
            source_id,
            title,
        } => {
            commands::run_ingest(path, *source_id, title.as_deref(), settings, credentials).await?;
        }

        Commands::Ask {
            source_id,
            question,
            model,
        } => {
            commands::run_ask(*source_id, question, model.as_deref(), settings, credentials).await?;
        }

        Commands::Summarize { source_id, model } => {
            commands::run_summarize(*source_id, model.as_deref(), settings, credentials).await?;
        }

        Commands::Overview { source_id, model } => {
            commands::run_overview(*source_id, model.as_deref(), settings, credentials).await?;
        }

        Commands::Report {
            source_id,
            template,
            template_id,
            model,
        } => {
            commands::run_report(
                *source_id,
                template.as_deref(),
                *template_id,
                model.as_deref(),
                settings,
                credentials,
            )
            .await?;
        }

        Commands::Templates { action } => {
            commands::run_templates(action, settings).await?;
        }

        Commands::Export {
            source_id,
            kind,
            format,
            template_id,
            model,
            output,
        } => {
            let request = ExportRequest {
                source_id: *source_id,
                content_type: kind.parse()?,
                format: format.parse()?,
                template_id: *template_id,
                model_key: model.clone(),
                content: None,
            };
            commands::run_export(&request, output, settings, credentials).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings, credentials).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, &config_path)?;
        }
    }

    Ok(())
}
