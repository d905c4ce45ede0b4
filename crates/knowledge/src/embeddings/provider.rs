//! Embedding provider trait and factory.

use super::providers::{gemini::GeminiProvider, mock::MockProvider, ollama::OllamaProvider};
use lexrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What the vector will be used for. Providers that distinguish retrieval
/// queries from indexed documents receive this as a task hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskIntent {
    Query,
    Document,
}

/// Trait for embedding providers.
///
/// Providers classify failures at the boundary: quota signals become
/// `AppError::EmbeddingRateLimited`, deadline overruns `AppError::Timeout`,
/// anything else `AppError::Embedding`. Dimension checks are left to the
/// gateway.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "gemini", "ollama", "mock")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Embed one text, requesting `dimensions` output values.
    async fn embed(&self, text: &str, intent: TaskIntent, dimensions: usize)
        -> AppResult<Vec<f32>>;
}

/// Settings resolved from `AppConfig` and `RagConfig` for one provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub provider: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

/// Create an embedding provider from resolved settings.
pub fn create_provider(settings: &ProviderSettings) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.to_lowercase().as_str() {
        "mock" => Ok(Arc::new(MockProvider::new())),

        "gemini" => {
            let api_key = settings.api_key.as_deref().ok_or_else(|| {
                AppError::Config("Gemini embedding provider requires an API key".to_string())
            })?;
            let provider = GeminiProvider::new(
                settings.endpoint.as_deref(),
                api_key,
                settings.model.as_deref(),
                settings.timeout,
            )?;
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = OllamaProvider::new(
                settings.endpoint.as_deref(),
                settings.model.as_deref(),
                settings.timeout,
            )?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: gemini, ollama, mock",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> ProviderSettings {
        ProviderSettings {
            provider: provider.to_string(),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_create_mock_provider() {
        let provider = create_provider(&settings("mock")).unwrap();
        assert_eq!(provider.provider_name(), "mock");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(&settings("Ollama")).unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_gemini_requires_key() {
        assert!(create_provider(&settings("gemini")).is_err());

        let mut with_key = settings("gemini");
        with_key.api_key = Some("key".to_string());
        let provider = create_provider(&with_key).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-004");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&settings("unknown"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_intent_serialization() {
        assert_eq!(serde_json::to_string(&TaskIntent::Query).unwrap(), "\"query\"");
    }
}
