//! Prompt definition and rendered prompt types.

use serde::{Deserialize, Serialize};

/// A prompt definition, built in or read from `.lexrag/prompts/<id>.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDefinition {
    pub id: String,

    pub title: String,

    /// Schema version, "major.minor"
    pub api_version: String,

    #[serde(default)]
    pub created_by: String,

    #[serde(default)]
    pub behavior: PromptBehavior,

    /// System instructions, Handlebars syntax
    #[serde(default)]
    pub system: Option<String>,

    /// User turn, Handlebars syntax
    pub template: String,

    #[serde(default)]
    pub output: PromptOutputSpec,
}

impl PromptDefinition {
    /// Whether the user template reads `variable`, either as `{{variable}}`
    /// or as the condition of a block helper.
    pub fn uses_variable(&self, variable: &str) -> bool {
        let compact: String = self.template.split_whitespace().collect();
        [
            format!("{{{{{}}}}}", variable),
            format!("{{{{{{{}}}}}}}", variable),
            format!("#if{}}}}}", variable),
        ]
        .iter()
        .any(|needle| compact.contains(needle.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// e.g. "formal", "neutral"
    pub tone: String,

    /// e.g. "sectioned", "concise"
    pub style: String,
}

impl Default for PromptBehavior {
    fn default() -> Self {
        Self {
            tone: "formal".to_string(),
            style: "sectioned".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// e.g. "markdown", "text"
    pub format: String,
}

impl Default for PromptOutputSpec {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
        }
    }
}

/// A rendered prompt ready for an LLM request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuiltPrompt {
    /// Rendered system instructions; `None` when absent or blank
    pub system: Option<String>,

    pub user: String,

    pub source_prompt_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(template: &str) -> PromptDefinition {
        serde_yaml::from_str(&format!(
            "id: t\ntitle: T\napiVersion: \"1.0\"\ntemplate: {:?}\n",
            template
        ))
        .unwrap()
    }

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: test.prompt
title: Test Prompt
apiVersion: "1.0"
createdBy: test
behavior:
  tone: neutral
  style: concise
system: "Cite every claim."
template: "{{question}}"
output:
  format: text
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "test.prompt");
        assert_eq!(def.behavior.tone, "neutral");
        assert_eq!(def.output.format, "text");
        assert_eq!(def.system.as_deref(), Some("Cite every claim."));
    }

    #[test]
    fn test_optional_sections_default() {
        let def = definition("{{question}}");
        assert!(def.system.is_none());
        assert!(def.created_by.is_empty());
        assert_eq!(def.behavior.style, "sectioned");
        assert_eq!(def.output.format, "markdown");
    }

    #[test]
    fn test_uses_variable() {
        let def = definition("Q: {{ question }}\n{{#if repairNotes}}{{{repairNotes}}}{{/if}}");
        assert!(def.uses_variable("question"));
        assert!(def.uses_variable("repairNotes"));
        assert!(!def.uses_variable("context"));
    }
}
