//! Wiring from configuration to a ready pipeline.
//!
//! One [`RagWorkspace`] owns the store, the embedding gateway, the metrics
//! window and the generator for a `.lexrag/` directory.

use crate::config::RagConfig;
use crate::embeddings::{create_provider, EmbeddingGateway, ProviderSettings};
use crate::generator::AnswerGenerator;
use crate::ingest::Ingestor;
use crate::metrics::MetricsAggregator;
use crate::pipeline::RagPipeline;
use crate::retriever::VectorRetriever;
use crate::store::{SqliteStore, VectorStore};
use lexrag_core::{AppConfig, AppResult};
use lexrag_llm::create_client;
use lexrag_prompt::resolve_prompt;
use std::sync::Arc;
use std::time::Duration;

/// Store, gateway and pipeline for one workspace.
pub struct RagWorkspace {
    config: RagConfig,
    store: Arc<dyn VectorStore>,
    gateway: EmbeddingGateway,
    pipeline: RagPipeline,
}

impl RagWorkspace {
    /// Open (creating if needed) the workspace store and build every stage
    /// from `app`.
    pub fn open(app: &AppConfig) -> AppResult<Self> {
        let config = RagConfig::from_app(app)?;
        app.ensure_state_dir()?;

        let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::open(
            &app.store_path(),
            config.embedding.dimensions,
        )?);
        let gateway = EmbeddingGateway::new(
            create_provider(&embedding_settings(app, &config))?,
            config.embedding.dimensions,
        )
        .with_timeout(config.timeouts.embedding());

        let generator = build_generator(app, &config)?;
        Ok(Self::assemble(config, store, gateway, generator))
    }

    /// Build from already-constructed parts.
    pub fn assemble(
        config: RagConfig,
        store: Arc<dyn VectorStore>,
        gateway: EmbeddingGateway,
        generator: AnswerGenerator,
    ) -> Self {
        let retriever = VectorRetriever::new(
            Arc::clone(&store),
            config.embedding.dimensions,
            config.retrieval.clone(),
        )
        .with_timeout(config.timeouts.retrieval());
        let metrics = Arc::new(MetricsAggregator::new(config.metrics.capacity));

        let pipeline = RagPipeline::new(
            gateway.clone(),
            retriever,
            generator.with_timeout(config.timeouts.generation()),
            config.validation.clone(),
            metrics,
        )
        .with_repair_attempts(config.generation.repair_attempts);

        tracing::debug!(
            "Workspace ready: embeddings={}/{} D={}",
            gateway.provider().provider_name(),
            gateway.provider().model_name(),
            config.embedding.dimensions
        );

        Self {
            config,
            store,
            gateway,
            pipeline,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }

    /// A fresh ingestor over this workspace's store and gateway.
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            Arc::clone(&self.store),
            self.gateway.clone(),
            self.config.chunking.clone(),
            self.config.embedding.batch_size,
        )
    }
}

fn provider_timeout(app: &AppConfig, provider: &str) -> Option<Duration> {
    app.get_provider_config(provider)
        .and_then(|p| p.timeout_secs())
        .map(Duration::from_secs)
}

fn embedding_settings(app: &AppConfig, config: &RagConfig) -> ProviderSettings {
    let provider = config
        .embedding
        .provider
        .clone()
        .unwrap_or_else(|| app.embedding_provider());
    let provider_config = app.get_provider_config(&provider);

    ProviderSettings {
        model: config.embedding.model.clone().or_else(|| {
            provider_config
                .as_ref()
                .and_then(|p| p.embedding_model().map(str::to_string))
        }),
        endpoint: provider_config
            .as_ref()
            .and_then(|p| p.endpoint().map(str::to_string)),
        api_key: app.resolve_api_key(&provider),
        timeout: provider_timeout(app, &provider),
        provider,
    }
}

fn build_generator(app: &AppConfig, config: &RagConfig) -> AppResult<AnswerGenerator> {
    let provider_config = app.get_provider_config(&app.provider);
    let endpoint = provider_config.as_ref().and_then(|p| p.endpoint());
    let api_key = app.resolve_api_key(&app.provider);

    let client = create_client(
        &app.provider,
        endpoint,
        api_key.as_deref(),
        provider_timeout(app, &app.provider),
    )?;
    let model = provider_config
        .as_ref()
        .map(|p| p.model().to_string())
        .unwrap_or_else(|| app.model.clone());
    let prompt = resolve_prompt(&app.workspace, &config.generation.prompt_id)?;

    Ok(AnswerGenerator::new(
        client,
        prompt,
        model,
        config.generation.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mock_app(workspace: &TempDir) -> AppConfig {
        let mut app = AppConfig::default();
        app.workspace = workspace.path().to_path_buf();
        app.provider = "mock".to_string();
        app.model = "mock-model".to_string();
        app.rag_section = Some(
            serde_yaml::from_str("embedding:\n  dimensions: 64\nmetrics:\n  capacity: 5\n")
                .unwrap(),
        );
        app
    }

    #[tokio::test]
    async fn test_open_creates_store() {
        let dir = TempDir::new().unwrap();
        let app = mock_app(&dir);

        let workspace = RagWorkspace::open(&app).unwrap();
        assert!(app.store_path().exists());
        assert_eq!(workspace.gateway().dimensions(), 64);
        assert_eq!(workspace.store().dimensions(), 64);
        assert_eq!(workspace.pipeline().metrics().capacity(), 5);
        assert_eq!(workspace.gateway().provider().provider_name(), "mock");
    }

    #[test]
    fn test_embedding_settings_prefer_rag_section() {
        let dir = TempDir::new().unwrap();
        let mut app = mock_app(&dir);
        app.provider = "ollama".to_string();

        let mut config = RagConfig::default();
        config.embedding.provider = Some("mock".to_string());
        config.embedding.model = Some("custom".to_string());

        let settings = embedding_settings(&app, &config);
        assert_eq!(settings.provider, "mock");
        assert_eq!(settings.model.as_deref(), Some("custom"));
    }

    #[test]
    fn test_open_rejects_bad_rag_section() {
        let dir = TempDir::new().unwrap();
        let mut app = mock_app(&dir);
        app.rag_section = Some(serde_yaml::from_str("embedding:\n  dimensions: 0\n").unwrap());

        assert!(RagWorkspace::open(&app).is_err());
    }
}
