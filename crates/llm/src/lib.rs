//! LLM integration crate for LexRAG.
//!
//! Provider-agnostic text generation with conversation history and
//! grounding metadata, plus the failure classification every external
//! HTTP call in the workspace goes through.
//!
//! # Providers
//! - **Gemini**: Generative Language API (default)
//! - **Ollama**: Local LLM runtime
//! - **Mock**: Offline, deterministic
//!
//! # Example
//! ```no_run
//! use lexrag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What does article 5 say?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod errors;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{
    ChatRole, ChatTurn, GroundingMetadata, LlmClient, LlmRequest, LlmResponse, LlmUsage,
    WebCitation,
};
pub use factory::{create_client, ProviderType};
pub use providers::{GeminiClient, MockClient, OllamaClient, ScriptedReply};
