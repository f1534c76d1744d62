//! Stored report template commands.

use super::read_instructions;
use crate::cli::{Output, TemplateAction};
use crate::config::Settings;
use crate::vector_store::{NewTemplate, SqliteVectorStore, TemplateStore};
use anyhow::{bail, Result};

/// Run the templates command.
pub async fn run_templates(action: &TemplateAction, settings: Settings) -> Result<()> {
    let store = SqliteVectorStore::new(&settings.sqlite_path())?;

    match action {
        TemplateAction::List => {
            let templates = store.list_templates().await?;
            if templates.is_empty() {
                Output::info("No templates stored. Use 'notebook templates add <name> <prompt>' to add one.");
                return Ok(());
            }

            Output::header(&format!("Templates ({})", templates.len()));
            for template in &templates {
                let language = template.language.as_deref().unwrap_or("detected");
                Output::list_item(&format!("{} [{}] ({})", template.name, template.id, language));
            }
        }

        TemplateAction::Add {
            name,
            prompt,
            language,
        } => {
            let prompt_text = read_instructions(prompt)?;
            if name.trim().is_empty() || prompt_text.trim().is_empty() {
                bail!("A template needs a name and prompt text");
            }
            let created = store
                .create_template(&NewTemplate {
                    name: name.clone(),
                    prompt_text,
                    language: language.clone(),
                })
                .await?;
            Output::success(&format!("Stored template '{}' with id {}", created.name, created.id));
        }

        TemplateAction::Remove { id } => {
            if !store.delete_template(*id).await? {
                bail!("Template {} not found", id);
            }
            Output::success(&format!("Deleted template {}", id));
        }
    }

    Ok(())
}
