//! LLM provider factory.
//!
//! Resolves a provider name to a client implementation, injecting the
//! endpoint, API key and request timeout from configuration.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, MockClient, OllamaClient};
use lexrag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Gemini,
    Ollama,
    Mock,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "mock" | "offline" => Some(Self::Mock),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("gemini", "ollama", "mock")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - API key, required by Gemini
/// * `timeout` - Optional per-request timeout
///
/// # Errors
/// `AppError::Config` if the provider is unknown or a required secret is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", provider)))?;

    match provider_type {
        ProviderType::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Gemini provider requires API key".to_string())
            })?;
            let base_url = endpoint.unwrap_or(crate::providers::gemini::DEFAULT_GEMINI_URL);
            Ok(Arc::new(GeminiClient::with_base_url(
                base_url, api_key, timeout,
            )?))
        }
        ProviderType::Ollama => {
            let base_url = endpoint.unwrap_or(crate::providers::ollama::DEFAULT_OLLAMA_URL);
            let client = match timeout {
                Some(timeout) => OllamaClient::with_timeout(base_url, timeout)?,
                None => OllamaClient::with_base_url(base_url),
            };
            Ok(Arc::new(client))
        }
        ProviderType::Mock => Ok(Arc::new(MockClient::new())),
    }
}
