//! Prompt system for LexRAG.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, overridable per workspace
//! - A built-in grounded-answer prompt
//! - Handlebars template rendering

pub mod builder;
pub mod defaults;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use defaults::{default_grounded_answer, GROUNDED_ANSWER_PROMPT_ID};
pub use loader::{load_prompt, resolve_prompt};
pub use types::{BuiltPrompt, PromptBehavior, PromptDefinition, PromptOutputSpec};
