//! Embedding gateway.
//!
//! Every vector in the system, for stored chunks and for live queries,
//! passes through [`EmbeddingGateway::embed`], which enforces the
//! configured dimensionality D.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider, ProviderSettings, TaskIntent};

use futures::future::join_all;
use lexrag_core::{AppError, AppResult, Stage};
use std::sync::Arc;
use std::time::Duration;

/// Dimension-enforcing wrapper around one embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    dimensions: usize,
    timeout: Option<Duration>,
}

impl EmbeddingGateway {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimensions: usize) -> Self {
        Self {
            provider,
            dimensions,
            timeout: None,
        }
    }

    /// Give up on a single call after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed one text. The result always has exactly D values.
    ///
    /// Blank input is rejected before the provider is called.
    pub async fn embed(&self, text: &str, intent: TaskIntent) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(match intent {
                TaskIntent::Query => AppError::EmptyQuery,
                TaskIntent::Document => {
                    AppError::EmptyDocument("cannot embed blank text".to_string())
                }
            });
        }

        let call = self.provider.embed(text, intent, self.dimensions);
        let vector = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                AppError::Timeout {
                    stage: Stage::Embedding,
                }
            })??,
            None => call.await?,
        };

        check_dimensions(&vector, self.dimensions)?;
        Ok(vector)
    }

    /// Embed a live query.
    pub async fn embed_query(&self, query: &str) -> AppResult<Vec<f32>> {
        self.embed(query, TaskIntent::Query).await
    }

    /// Embed one batch of document texts concurrently.
    ///
    /// Results are positional; a failed item does not affect the others.
    pub async fn embed_batch(&self, texts: &[&str]) -> Vec<AppResult<Vec<f32>>> {
        tracing::debug!(
            "Embedding batch of {} texts with {} ({})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        join_all(
            texts
                .iter()
                .map(|text| self.embed(text, TaskIntent::Document)),
        )
        .await
    }
}

/// Fail with `DimensionMismatch` unless `vector` has `expected` values.
pub fn check_dimensions(vector: &[f32], expected: usize) -> AppResult<()> {
    if vector.len() != expected {
        tracing::error!(
            "Embedding dimension mismatch: expected {}, got {}",
            expected,
            vector.len()
        );
        return Err(AppError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
