//! Workspace prompt overrides.
//!
//! A file `.lexrag/prompts/<id>.yml` (or `.yaml`) replaces the built-in
//! definition with the same id.

use crate::defaults::builtin_prompt;
use crate::types::PromptDefinition;
use lexrag_core::config::STATE_DIR;
use lexrag_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Variables every answer prompt must render.
const REQUIRED_VARIABLES: [&str; 2] = ["question", "context"];

/// Load the workspace override for `prompt_id`.
///
/// Fails if no override file exists or it does not validate.
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = find_override(workspace_path, prompt_id).ok_or_else(|| {
        AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompts_dir(workspace_path).join(format!("{}.yml", prompt_id))
        ))
    })?;

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", prompt_file, e))
    })?;
    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", prompt_file, e))
    })?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }
    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);
    Ok(definition)
}

/// Workspace override if present, otherwise the built-in definition.
pub fn resolve_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if find_override(workspace_path, prompt_id).is_some() {
        return load_prompt(workspace_path, prompt_id);
    }

    match builtin_prompt(prompt_id)? {
        Some(definition) => {
            tracing::debug!("Using built-in prompt: {}", prompt_id);
            Ok(definition)
        }
        None => Err(AppError::Prompt(format!("Unknown prompt: {}", prompt_id))),
    }
}

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(STATE_DIR).join("prompts")
}

fn find_override(workspace_path: &Path, prompt_id: &str) -> Option<PathBuf> {
    let dir = prompts_dir(workspace_path);
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", prompt_id, ext)))
        .find(|path| path.is_file())
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    let fail = |msg: String| Err(AppError::Prompt(msg));

    if def.title.trim().is_empty() {
        return fail(format!("Prompt '{}' has an empty title", def.id));
    }
    let version_ok = def
        .api_version
        .split_once('.')
        .is_some_and(|(major, minor)| {
            major.parse::<u32>().is_ok() && minor.parse::<u32>().is_ok()
        });
    if !version_ok {
        return fail(format!(
            "Invalid apiVersion '{}' in prompt '{}'. Expected 'major.minor'",
            def.api_version, def.id
        ));
    }
    if let Some(missing) = REQUIRED_VARIABLES
        .iter()
        .find(|variable| !def.uses_variable(variable))
    {
        return fail(format!(
            "Prompt '{}' template never renders {{{{{}}}}}",
            def.id, missing
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::GROUNDED_ANSWER_PROMPT_ID;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, file_name: &str, body: &str) {
        let prompts_dir = dir.join(".lexrag/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(prompts_dir.join(file_name), body).unwrap();
    }

    fn override_yaml(id: &str, template: &str) -> String {
        format!(
            "id: {}\ntitle: Firm house style\napiVersion: \"1.1\"\ntemplate: {:?}\n",
            id, template
        )
    }

    #[test]
    fn test_resolve_falls_back_to_builtin() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = resolve_prompt(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap();
        assert!(prompt.system.is_some());
    }

    #[test]
    fn test_resolve_prefers_workspace_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            &format!("{}.yaml", GROUNDED_ANSWER_PROMPT_ID),
            &override_yaml(
                GROUNDED_ANSWER_PROMPT_ID,
                "Override: {{question}}\n{{context}}",
            ),
        );

        let prompt = resolve_prompt(temp_dir.path(), GROUNDED_ANSWER_PROMPT_ID).unwrap();
        assert_eq!(prompt.title, "Firm house style");
        assert!(prompt.template.starts_with("Override:"));
    }

    #[test]
    fn test_override_without_context_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "answer.yml",
            &override_yaml("answer", "Just answer: {{question}}"),
        );

        let err = load_prompt(temp_dir.path(), "answer").unwrap_err();
        assert!(err.to_string().contains("{{context}}"));
    }

    #[test]
    fn test_override_with_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "answer.yml",
            &override_yaml("other", "{{question}} {{context}}"),
        );

        assert!(load_prompt(temp_dir.path(), "answer").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "broken.yml", "invalid: yaml: content:");

        let result = load_prompt(temp_dir.path(), "broken");
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
        assert!(resolve_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_api_version_format() {
        let mut def = crate::default_grounded_answer().unwrap();
        assert!(validate_prompt(&def).is_ok());

        def.api_version = "v1".to_string();
        assert!(validate_prompt(&def).is_err());
    }
}
