//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use crate::credentials::mask_secret;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: Settings, config_path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings.redacted())
                .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Set { key, value } => {
            let mut table = if config_path.exists() {
                std::fs::read_to_string(config_path)?
                    .parse::<toml::Table>()
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?
            } else {
                toml::Table::new()
            };

            set_value(&mut table, key, value)?;

            // Reject values that would make the file unloadable.
            let updated: Settings = toml::Value::Table(table.clone())
                .try_into()
                .map_err(|e| anyhow!("Invalid value for {}: {}", key, e))?;
            updated.providers.validate()?;

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(config_path, toml::to_string_pretty(&table)?)?;

            let shown = if key.ends_with("api_key") {
                mask_secret(value)
            } else {
                value.clone()
            };
            Output::success(&format!("Set {} = {}", key, shown));
        }

        ConfigAction::Edit => {
            // Create default config if it doesn't exist
            if !config_path.exists() {
                settings.save_to(&config_path.to_path_buf())?;
                Output::info(&format!("Created default config at {:?}", config_path));
            }

            let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vim".to_string());

            Output::info(&format!("Opening config in {}...", editor));

            let status = std::process::Command::new(&editor)
                .arg(config_path)
                .status();

            match status {
                Ok(s) if s.success() => {
                    Output::success("Config saved.");
                }
                Ok(_) => {
                    Output::warning("Editor exited with non-zero status.");
                }
                Err(e) => {
                    Output::error(&format!("Failed to open editor: {}", e));
                    Output::info(&format!("Config file is at: {:?}", config_path));
                }
            }
        }

        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }

    Ok(())
}

/// Set a dotted key, creating intermediate sections.
fn set_value(table: &mut toml::Table, key: &str, raw: &str) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts
        .pop()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("Empty configuration key"))?;

    let mut current = table;
    for part in parts {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("'{}' is not a section", part))?;
    }

    current.insert(last.to_string(), parse_value(raw));
    Ok(())
}

fn parse_value(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_nested_value() {
        let mut table = toml::Table::new();
        set_value(&mut table, "providers.openai.api_key", "sk-abc").unwrap();
        set_value(&mut table, "chunking.max_chunk_chars", "400").unwrap();

        let settings: Settings = toml::Value::Table(table).try_into().unwrap();
        assert_eq!(settings.providers.openai.api_key.as_deref(), Some("sk-abc"));
        assert_eq!(settings.chunking.max_chunk_chars, 400);
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut table = toml::Table::new();
        set_value(&mut table, "generation", "x").unwrap();
        assert!(set_value(&mut table, "generation.default_model", "y").is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("42"), toml::Value::Integer(42));
        assert_eq!(parse_value("ollama_llama3"), toml::Value::String("ollama_llama3".into()));
    }
}
