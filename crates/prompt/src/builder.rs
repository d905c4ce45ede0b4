//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use lexrag_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the system instructions and the user template are rendered with
/// the same variables. Missing variables render as empty strings, so
/// optional sections can be guarded with `{{#if name}}`.
///
/// # Example
/// ```no_run
/// use lexrag_prompt::{build_prompt, default_grounded_answer};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "Who may terminate the lease?".to_string());
///
/// let built = build_prompt(&default_grounded_answer()?, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let handlebars = registry();

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(&handlebars, template, &variables))
        .transpose()?
        .map(|rendered| rendered.trim().to_string())
        .filter(|rendered| !rendered.is_empty());

    let user = render_template(&handlebars, &definition.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        source_prompt_id: definition.id.clone(),
    })
}

fn registry() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();
    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
}

/// Render a Handlebars template with variables.
fn render_template(
    handlebars: &Handlebars<'_>,
    template: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render_template(template, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptOutputSpec};

    fn create_test_definition(system: Option<&str>, template: &str) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                tone: "formal".to_string(),
                style: "concise".to_string(),
            },
            system: system.map(str::to_string),
            template: template.to_string(),
            output: PromptOutputSpec {
                format: "markdown".to_string(),
            },
        }
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Hello & <world>".to_string());

        let rendered = render_template(&registry(), "Question: {{question}}", &vars).unwrap();
        assert_eq!(rendered, "Question: Hello & <world>");
    }

    #[test]
    fn test_build_prompt_renders_system_and_user() {
        let def = create_test_definition(Some("Answer in {{language}}."), "Q: {{question}}");
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "Test question".to_string());
        vars.insert("language".to_string(), "English".to_string());

        let built = build_prompt(&def, vars).unwrap();
        assert_eq!(built.user, "Q: Test question");
        assert_eq!(built.system.as_deref(), Some("Answer in English."));
        assert_eq!(built.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_optional_section_is_skipped_when_missing() {
        let def = create_test_definition(
            None,
            "Q: {{question}}{{#if repairNotes}}\nFix: {{repairNotes}}{{/if}}",
        );
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), "q".to_string());

        let built = build_prompt(&def, vars.clone()).unwrap();
        assert_eq!(built.user, "Q: q");
        assert!(built.system.is_none());

        vars.insert("repairNotes".to_string(), "- add citations".to_string());
        let built = build_prompt(&def, vars).unwrap();
        assert!(built.user.ends_with("Fix: - add citations"));
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let def = create_test_definition(None, "{{#if question}}unclosed");
        let err = build_prompt(&def, HashMap::new()).unwrap_err();
        assert!(matches!(err, AppError::Prompt(_)));
    }
}
