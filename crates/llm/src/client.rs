//! LLM client abstraction and request/response types.
//!
//! This module defines the provider-agnostic contract for grounded text
//! generation: a prompt, an optional system instruction, prior conversation
//! turns, and a response that may carry grounding metadata.

use lexrag_core::AppResult;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The prompt text for the current turn
    pub prompt: String,

    /// Model identifier (e.g., "gemini-2.0-flash", "llama3.2")
    pub model: String,

    /// System instruction (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Prior conversation turns, oldest first
    #[serde(default)]
    pub history: Vec<ChatTurn>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-p nucleus sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl LlmRequest {
    /// Create a new LLM request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            history: Vec::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach prior conversation turns.
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// A web source the model consulted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebCitation {
    pub title: String,
    pub uri: String,
}

/// Grounding information returned alongside generated text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    /// Web pages the model grounded on
    #[serde(default)]
    pub web_citations: Vec<WebCitation>,

    /// Search queries the model issued
    #[serde(default)]
    pub search_queries: Vec<String>,
}

impl GroundingMetadata {
    pub fn is_empty(&self) -> bool {
        self.web_citations.is_empty() && self.search_queries.is_empty()
    }
}

/// LLM completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Usage statistics
    pub usage: LlmUsage,

    /// Grounding metadata, when the provider reports any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding: Option<GroundingMetadata>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Trait for LLM providers.
///
/// Implementations classify failures at the boundary: quota/rate-limit
/// signals become `AppError::GenerationRateLimited`, deadline overruns
/// become `AppError::Timeout`, everything else `AppError::GenerationFailed`.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "gemini", "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("What does article 5 say?", "gemini-2.0-flash")
            .with_system("Answer with citations")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_history(vec![ChatTurn::user("hi"), ChatTurn::model("hello")]);

        assert_eq!(request.model, "gemini-2.0-flash");
        assert_eq!(request.system.as_deref(), Some("Answer with citations"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[1].role, ChatRole::Model);
    }

    #[test]
    fn test_grounding_metadata_serialization() {
        let metadata = GroundingMetadata {
            web_citations: vec![WebCitation {
                title: "Official Gazette".to_string(),
                uri: "https://example.org/gazette".to_string(),
            }],
            search_queries: vec!["labor code article 7".to_string()],
        };

        let json = serde_json::to_value(&metadata).unwrap();
        assert!(json.get("webCitations").is_some());
        assert!(json.get("searchQueries").is_some());
        assert!(!metadata.is_empty());
        assert!(GroundingMetadata::default().is_empty());
    }

    #[test]
    fn test_usage_totals() {
        let usage = LlmUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
    }
}
