//! Pipeline configuration.
//!
//! Read from the `rag:` section of `.lexrag/config.yaml`. Every key is
//! optional and falls back to the defaults below.

use lexrag_core::{AppConfig, AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RagConfig {
    pub embedding: EmbeddingSettings,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    pub metrics: MetricsConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Vector dimensionality D shared by every stored and query vector
    pub dimensions: usize,
    /// Chunks embedded concurrently per ingestion batch
    pub batch_size: usize,
    /// Overrides `llm.activeEmbeddingProvider`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Overrides the provider's `embeddingModel`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimensions: 768,
            batch_size: 10,
            provider: None,
            model: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub min_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            min_tokens: 50,
            overlap_tokens: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_threshold: f32,
    pub min_threshold: f32,
    pub max_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 20,
            default_threshold: 0.5,
            min_threshold: 0.1,
            max_threshold: 0.95,
        }
    }
}

impl RetrievalConfig {
    /// Clamp a requested limit to `1..=max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }

    /// Clamp a requested threshold to `[min_threshold, max_threshold]`.
    pub fn clamp_threshold(&self, requested: Option<f32>) -> f32 {
        let threshold = requested
            .filter(|t| t.is_finite())
            .unwrap_or(self.default_threshold);
        threshold.clamp(self.min_threshold, self.max_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Overrides the configured generation model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sources quoted by the rate-limit fallback answer
    pub fallback_sources: usize,
    pub fallback_preview_chars: usize,
    /// Re-prompts allowed after a failed validation
    pub repair_attempts: u32,
    /// Prompt definition id
    pub prompt_id: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            max_tokens: 2048,
            fallback_sources: 3,
            fallback_preview_chars: 300,
            repair_attempts: 1,
            prompt_id: lexrag_prompt::GROUNDED_ANSWER_PROMPT_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationConfig {
    pub min_citations: usize,
    /// Context chunks shorter than this are not checked for copying
    pub min_raw_chunk_chars: usize,
    /// Length of a verbatim run that counts as copying
    pub raw_copy_window: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_citations: 3,
            min_raw_chunk_chars: 100,
            raw_copy_window: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    pub capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { capacity: 200 }
    }
}

/// Per-stage deadlines. Unset means no deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Option<Duration> {
        self.embedding_secs.map(Duration::from_secs)
    }

    pub fn retrieval(&self) -> Option<Duration> {
        self.retrieval_secs.map(Duration::from_secs)
    }

    pub fn generation(&self) -> Option<Duration> {
        self.generation_secs.map(Duration::from_secs)
    }
}

impl RagConfig {
    /// Build from the `rag:` section captured by `AppConfig`.
    pub fn from_app(app: &AppConfig) -> AppResult<Self> {
        let config = match &app.rag_section {
            Some(section) => serde_yaml::from_value::<RagConfig>(section.clone())
                .map_err(|e| AppError::Config(format!("Invalid rag configuration: {}", e)))?,
            None => RagConfig::default(),
        };

        config.validate()?;
        tracing::debug!(
            "Pipeline config: D={}, batch={}, limit<={}, threshold in [{}, {}]",
            config.embedding.dimensions,
            config.embedding.batch_size,
            config.retrieval.max_limit,
            config.retrieval.min_threshold,
            config.retrieval.max_threshold
        );

        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        let fail = |msg: String| Err(AppError::Config(msg));

        if self.embedding.dimensions == 0 {
            return fail("rag.embedding.dimensions must be greater than 0".to_string());
        }
        if self.embedding.batch_size == 0 {
            return fail("rag.embedding.batchSize must be greater than 0".to_string());
        }
        if self.chunking.max_tokens == 0 {
            return fail("rag.chunking.maxTokens must be greater than 0".to_string());
        }
        if self.chunking.min_tokens > self.chunking.max_tokens {
            return fail(format!(
                "rag.chunking.minTokens ({}) exceeds maxTokens ({})",
                self.chunking.min_tokens, self.chunking.max_tokens
            ));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return fail(format!(
                "rag.chunking.overlapTokens ({}) must be smaller than maxTokens ({})",
                self.chunking.overlap_tokens, self.chunking.max_tokens
            ));
        }

        let r = &self.retrieval;
        if r.max_limit == 0 {
            return fail("rag.retrieval.maxLimit must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&r.min_threshold) || !(0.0..=1.0).contains(&r.max_threshold) {
            return fail("rag.retrieval thresholds must lie in [0, 1]".to_string());
        }
        if r.min_threshold > r.max_threshold {
            return fail(format!(
                "rag.retrieval.minThreshold ({}) exceeds maxThreshold ({})",
                r.min_threshold, r.max_threshold
            ));
        }

        if self.metrics.capacity == 0 {
            return fail("rag.metrics.capacity must be greater than 0".to_string());
        }
        if self.validation.raw_copy_window == 0 {
            return fail("rag.validation.rawCopyWindow must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> AppResult<RagConfig> {
        let app = AppConfig {
            rag_section: Some(serde_yaml::from_str(yaml).unwrap()),
            ..AppConfig::default()
        };
        RagConfig::from_app(&app)
    }

    #[test]
    fn test_defaults_without_section() {
        let config = RagConfig::from_app(&AppConfig::default()).unwrap();
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.metrics.capacity, 200);
        assert_eq!(config.validation.min_citations, 3);
        assert_eq!(config.generation.fallback_sources, 3);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = from_yaml(
            r#"
embedding:
  dimensions: 1536
retrieval:
  maxLimit: 8
timeouts:
  generationSecs: 30
"#,
        )
        .unwrap();

        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.embedding.batch_size, 10);
        assert_eq!(config.retrieval.max_limit, 8);
        assert_eq!(config.retrieval.default_limit, 5);
        assert_eq!(config.timeouts.generation(), Some(Duration::from_secs(30)));
        assert_eq!(config.timeouts.embedding(), None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(from_yaml("embedding: {dimensions: 0}").is_err());
        assert!(from_yaml("chunking: {maxTokens: 100, overlapTokens: 100}").is_err());
        assert!(from_yaml("retrieval: {minThreshold: 0.9, maxThreshold: 0.2}").is_err());
        assert!(from_yaml("metrics: {capacity: 0}").is_err());
    }

    #[test]
    fn test_clamping() {
        let retrieval = RetrievalConfig::default();
        assert_eq!(retrieval.clamp_limit(None), 5);
        assert_eq!(retrieval.clamp_limit(Some(500)), 20);
        assert_eq!(retrieval.clamp_limit(Some(0)), 1);

        assert_eq!(retrieval.clamp_threshold(None), 0.5);
        assert_eq!(retrieval.clamp_threshold(Some(0.0)), 0.1);
        assert_eq!(retrieval.clamp_threshold(Some(0.99)), 0.95);
        assert_eq!(retrieval.clamp_threshold(Some(f32::NAN)), 0.5);
    }
}
