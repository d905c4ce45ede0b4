//! Request pipeline.
//!
//! query → embed → retrieve → generate → validate (→ repair) → metric.
//! Each stage is also exposed on its own for callers that compose them.

use crate::config::ValidationConfig;
use crate::embeddings::EmbeddingGateway;
use crate::generator::{AnswerGenerator, GeneratedAnswer};
use crate::metrics::{MetricsAggregator, MetricsSummary, RagMetric};
use crate::retriever::VectorRetriever;
use crate::types::{DocumentCategory, RetrievalResult};
use crate::validator::{check_answer_quality, AnswerValidationResult};
use lexrag_core::{AppError, AppResult};
use lexrag_llm::{ChatTurn, GroundingMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Message shown when retrieval finds nothing above the threshold.
pub const NO_GROUNDED_ANSWER_MESSAGE: &str =
    "No sufficiently relevant documents were found, so no grounded answer is possible.";

/// One question, with optional filters and prior turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl AskRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: DocumentCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// A generated (or fallback) answer with its evidence and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedAnswer {
    pub answer: String,
    pub sources: Vec<RetrievalResult>,
    pub validation: AnswerValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    pub fallback_used: bool,
    /// Re-prompts made after failed validation
    pub repair_attempts: u32,
    pub model: String,
    pub latency_ms: u64,
}

/// Result of [`RagPipeline::ask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AskOutcome {
    /// Retrieval found nothing relevant. Not an error.
    #[serde(rename_all = "camelCase")]
    NoGroundedAnswer { latency_ms: u64 },
    Answered(GroundedAnswer),
}

impl AskOutcome {
    pub fn answer(&self) -> Option<&GroundedAnswer> {
        match self {
            AskOutcome::Answered(answer) => Some(answer),
            AskOutcome::NoGroundedAnswer { .. } => None,
        }
    }
}

/// Retrieval-and-grounding pipeline.
pub struct RagPipeline {
    gateway: EmbeddingGateway,
    retriever: VectorRetriever,
    generator: AnswerGenerator,
    validation: ValidationConfig,
    repair_attempts: u32,
    metrics: Arc<MetricsAggregator>,
}

impl RagPipeline {
    pub fn new(
        gateway: EmbeddingGateway,
        retriever: VectorRetriever,
        generator: AnswerGenerator,
        validation: ValidationConfig,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            gateway,
            retriever,
            generator,
            validation,
            repair_attempts: 1,
            metrics,
        }
    }

    /// Re-prompts allowed after a failed validation (0 disables repair).
    pub fn with_repair_attempts(mut self, attempts: u32) -> Self {
        self.repair_attempts = attempts;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    /// Embed `query` and retrieve ranked chunks for it.
    pub async fn retrieve_relevant_chunks(
        &self,
        query: &str,
        category: Option<DocumentCategory>,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> AppResult<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(AppError::EmptyQuery);
        }

        let query_vector = self.gateway.embed_query(query).await?;
        self.retriever
            .retrieve(&query_vector, category, limit, threshold)
            .await
    }

    /// Generate an answer grounded on `sources`.
    pub async fn generate_answer(
        &self,
        query: &str,
        sources: &[RetrievalResult],
        history: &[ChatTurn],
    ) -> AppResult<GeneratedAnswer> {
        self.generator.generate(query, sources, history).await
    }

    /// Validate an answer against the sources it was generated from.
    pub fn check_answer_quality(
        &self,
        question: &str,
        answer: &str,
        sources: &[RetrievalResult],
    ) -> AnswerValidationResult {
        let chunk_texts: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
        check_answer_quality(question, answer, &chunk_texts, &self.validation)
    }

    pub fn record_rag_metric(&self, metric: RagMetric) {
        self.metrics.record(metric);
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    /// Answer one question end to end.
    ///
    /// Zero retrieval results yield [`AskOutcome::NoGroundedAnswer`]. An
    /// answer that fails validation is re-prompted up to the configured
    /// number of times, except for fallback answers; the last validation
    /// is returned either way.
    pub async fn ask(&self, request: AskRequest) -> AppResult<AskOutcome> {
        let started = Instant::now();

        let result = self.answer(&request, started).await;
        if let Err(e) = &result {
            tracing::warn!(
                "Request failed after {}ms: {}",
                started.elapsed().as_millis(),
                e
            );
        }
        result
    }

    async fn answer(&self, request: &AskRequest, started: Instant) -> AppResult<AskOutcome> {
        let sources = self
            .retrieve_relevant_chunks(
                &request.query,
                request.category,
                request.limit,
                request.threshold,
            )
            .await?;

        if sources.is_empty() {
            let latency_ms = elapsed_ms(started);
            tracing::info!("No grounded answer possible for query ({}ms)", latency_ms);
            self.record_rag_metric(RagMetric::new(&request.query, latency_ms, 0, false, 0));
            return Ok(AskOutcome::NoGroundedAnswer { latency_ms });
        }

        let mut generated = self
            .generate_answer(&request.query, &sources, &request.history)
            .await?;
        let mut validation =
            self.check_answer_quality(&request.query, &generated.answer, &sources);

        let mut repairs = 0;
        while !validation.valid && !generated.fallback_used && repairs < self.repair_attempts {
            repairs += 1;
            tracing::warn!(
                "Answer failed validation ({} issues), re-prompting ({}/{})",
                validation.issues.len(),
                repairs,
                self.repair_attempts
            );
            generated = self
                .generator
                .regenerate(&request.query, &sources, &request.history, &validation.issues)
                .await?;
            validation = self.check_answer_quality(&request.query, &generated.answer, &sources);
        }

        if !validation.valid {
            tracing::warn!("Returning answer with validation issues: {:?}", validation.issues);
        }

        let latency_ms = elapsed_ms(started);
        self.record_rag_metric(RagMetric::new(
            &request.query,
            latency_ms,
            validation.citation_count,
            generated.fallback_used,
            distinct_documents(&sources),
        ));
        tracing::info!(
            "Answered from {} chunks in {}ms (fallback: {}, valid: {})",
            sources.len(),
            latency_ms,
            generated.fallback_used,
            validation.valid
        );

        Ok(AskOutcome::Answered(GroundedAnswer {
            answer: generated.answer,
            sources,
            validation,
            grounding_metadata: generated.grounding_metadata,
            fallback_used: generated.fallback_used,
            repair_attempts: repairs,
            model: generated.model,
            latency_ms,
        }))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn distinct_documents(sources: &[RetrievalResult]) -> usize {
    sources
        .iter()
        .map(|s| s.document_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}
