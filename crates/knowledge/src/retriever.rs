//! Vector retriever.
//!
//! Threshold- and category-filtered similarity retrieval over the store,
//! with clamped request parameters and a deterministic result order.

use crate::config::RetrievalConfig;
use crate::embeddings::check_dimensions;
use crate::store::{rank_results, VectorStore};
use crate::types::{DocumentCategory, RetrievalResult};
use lexrag_core::{AppError, AppResult, Stage};
use std::sync::Arc;
use std::time::Duration;

/// Retrieves ranked chunks for a query vector.
#[derive(Clone)]
pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    dimensions: usize,
    config: RetrievalConfig,
    timeout: Option<Duration>,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn VectorStore>, dimensions: usize, config: RetrievalConfig) -> Self {
        Self {
            store,
            dimensions,
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Ranked matches with `similarity >= threshold`, at most `limit`.
    ///
    /// `limit` and `threshold` are clamped to the configured bounds;
    /// `None` selects the configured default. An empty result means no
    /// sufficiently relevant material and is not an error.
    pub async fn retrieve(
        &self,
        query_vector: &[f32],
        category: Option<DocumentCategory>,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> AppResult<Vec<RetrievalResult>> {
        check_dimensions(query_vector, self.dimensions)?;

        let limit = self.config.clamp_limit(limit);
        let threshold = self.config.clamp_threshold(threshold);

        let search = self
            .store
            .similarity_search(query_vector, threshold, category, limit);
        let results = match self.timeout {
            Some(deadline) => tokio::time::timeout(deadline, search)
                .await
                .map_err(|_| AppError::Timeout {
                    stage: Stage::Retrieval,
                })??,
            None => search.await?,
        };

        // Final order is owned here, whatever the backend returned.
        let results = rank_results(results, threshold, limit);

        tracing::debug!(
            "Retrieved {} chunks (limit {}, threshold {:.2}, category {})",
            results.len(),
            limit,
            threshold,
            category.map(|c| c.as_str()).unwrap_or("any")
        );

        Ok(results)
    }
}
