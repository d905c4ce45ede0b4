//! Built-in prompt definitions.

use crate::types::PromptDefinition;
use lexrag_core::{AppError, AppResult};

/// Identifier of the grounded-answer prompt.
pub const GROUNDED_ANSWER_PROMPT_ID: &str = "lexrag.answer.grounded";

const GROUNDED_ANSWER_YAML: &str = r###"
id: lexrag.answer.grounded
title: Grounded legal answer
apiVersion: "1.0"
createdBy: lexrag
behavior:
  tone: formal
  style: sectioned
system: |
  You are a legal research assistant. Answer only from the context excerpts supplied with the question.
  Citation rules:
  - Cite every claim inline using the exact label of the excerpt it comes from, for example [Source: Civil Code, page 12].
  - Cite at least three distinct excerpts. Every citation names the document and the page.
  - Never cite web pages or material outside the supplied excerpts.
  Writing rules:
  - Paraphrase. Do not copy sentences from the excerpts.
  - Be specific. Avoid vague qualifiers such as "generally", "typically" or "in most cases".
  - When the question has several parts, answer each part under its own "## " heading.
  - When the excerpts do not contain the answer, say so and list every document you examined.
template: |
  Question: {{question}}

  Context excerpts:
  {{context}}
  {{#if repairNotes}}

  A previous draft was rejected for these reasons:
  {{repairNotes}}
  Write a new answer that resolves every point above.
  {{/if}}
output:
  format: markdown
"###;

/// The built-in grounded-answer prompt.
pub fn default_grounded_answer() -> AppResult<PromptDefinition> {
    serde_yaml::from_str(GROUNDED_ANSWER_YAML)
        .map_err(|e| AppError::Prompt(format!("Built-in prompt is invalid: {}", e)))
}

/// Look up a built-in prompt by id.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    match prompt_id {
        GROUNDED_ANSWER_PROMPT_ID => default_grounded_answer().map(Some),
        _ => Ok(None),
    }
}
