//! Document ingestion.
//!
//! chunk → persist unindexed → embed in sequential batches → attach.
//! Each batch is attached before the next one starts, so an interrupted
//! run leaves an embedded prefix and an unindexed suffix.

use crate::chunker::{self, Segment};
use crate::config::ChunkingConfig;
use crate::embeddings::EmbeddingGateway;
use crate::progress::ProgressReporter;
use crate::store::VectorStore;
use crate::types::{Chunk, Document, EmbeddingFailure, IngestReport, NewDocument};
use chrono::Utc;
use lexrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of re-embedding unindexed chunks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReembedReport {
    pub attempted: usize,
    pub embedded: usize,
    /// Chunk ids that are still unindexed
    pub failed: Vec<String>,
}

struct BatchOutcome {
    embedded: usize,
    failed: Vec<(Chunk, String)>,
}

/// Writes documents and their embedded chunks to the store.
pub struct Ingestor {
    store: Arc<dyn VectorStore>,
    gateway: EmbeddingGateway,
    chunking: ChunkingConfig,
    batch_size: usize,
    progress: ProgressReporter,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn VectorStore>,
        gateway: EmbeddingGateway,
        chunking: ChunkingConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            gateway,
            chunking,
            batch_size: batch_size.max(1),
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Ingest one document.
    ///
    /// Blank text is rejected before anything is stored or embedded. Items
    /// that fail to embed are reported and stay unindexed.
    pub async fn ingest(&self, input: NewDocument) -> AppResult<IngestReport> {
        let started = Instant::now();

        if input.text.trim().is_empty() {
            return Err(AppError::EmptyDocument(input.name));
        }

        let segments = chunker::chunk(&input.text, &self.chunking);
        if segments.is_empty() {
            return Err(AppError::EmptyDocument(input.name));
        }
        self.progress.chunked(&input.name, segments.len());

        let document = Document {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            category: input.category,
            source_url: input.source_url,
            storage_locator: input.storage_locator,
            page_count: chunker::page_count(&input.text),
            created_at: Utc::now(),
        };
        let chunks: Vec<Chunk> = segments
            .into_iter()
            .map(|segment| to_chunk(&document.id, segment))
            .collect();

        self.store.insert_document(&document).await?;
        if let Err(e) = self.store.insert_chunks(&chunks).await {
            // Leave no document without chunks behind.
            if let Err(cleanup) = self.store.delete_document(&document.id).await {
                tracing::warn!("Failed to remove partial document {}: {}", document.id, cleanup);
            }
            return Err(e);
        }
        self.progress.stored(chunks.len());

        let outcome = self.embed_and_attach(&chunks).await?;

        let failures: Vec<EmbeddingFailure> = outcome
            .failed
            .into_iter()
            .map(|(chunk, error)| EmbeddingFailure {
                sequence_index: chunk.sequence_index,
                error,
            })
            .collect();

        let report = IngestReport {
            document_id: document.id,
            page_count: document.page_count,
            chunks_total: chunks.len(),
            chunks_embedded: outcome.embedded,
            failures,
            duration_secs: started.elapsed().as_secs_f64(),
        };

        if report.is_complete() {
            tracing::info!(
                "Ingested '{}': {} chunks over {} pages in {:.2}s",
                document.name,
                report.chunks_total,
                report.page_count,
                report.duration_secs
            );
        } else {
            tracing::warn!(
                "Ingested '{}' partially: {}/{} chunks embedded",
                document.name,
                report.chunks_embedded,
                report.chunks_total
            );
        }

        Ok(report)
    }

    /// Embed up to `limit` unindexed chunks, oldest documents first.
    pub async fn reembed_unindexed(&self, limit: usize) -> AppResult<ReembedReport> {
        let pending = self.store.unindexed_chunks(limit).await?;
        if pending.is_empty() {
            return Ok(ReembedReport::default());
        }

        let outcome = self.embed_and_attach(&pending).await?;
        tracing::info!(
            "Re-embedded {}/{} unindexed chunks",
            outcome.embedded,
            pending.len()
        );

        Ok(ReembedReport {
            attempted: pending.len(),
            embedded: outcome.embedded,
            failed: outcome.failed.into_iter().map(|(chunk, _)| chunk.id).collect(),
        })
    }

    /// Reset stored vectors whose length differs from the configured
    /// dimensionality. They become unindexed and can be re-embedded.
    pub async fn repair_dimensions(&self) -> AppResult<usize> {
        let expected = self.gateway.dimensions();
        let drifted = self.store.mismatched_chunk_ids(expected).await?;
        if drifted.is_empty() {
            return Ok(0);
        }

        let cleared = self.store.clear_embeddings(&drifted).await?;
        tracing::warn!(
            "Cleared {} embeddings with wrong dimensionality (expected {})",
            cleared,
            expected
        );
        Ok(cleared)
    }

    async fn embed_and_attach(&self, chunks: &[Chunk]) -> AppResult<BatchOutcome> {
        let mut outcome = BatchOutcome {
            embedded: 0,
            failed: Vec::new(),
        };
        let model = self.gateway.provider().model_name().to_string();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let results = self.gateway.embed_batch(&texts).await;

            let mut embedded = Vec::with_capacity(batch.len());
            for (chunk, result) in batch.iter().zip(results) {
                match result {
                    Ok(vector) => embedded.push((chunk.id.clone(), vector)),
                    Err(e) => {
                        tracing::warn!(
                            "Embedding failed for chunk {} of document {}: {}",
                            chunk.sequence_index,
                            chunk.document_id,
                            e
                        );
                        outcome.failed.push((chunk.clone(), e.to_string()));
                    }
                }
            }

            if !embedded.is_empty() {
                self.store.attach_embeddings(&embedded).await?;
                outcome.embedded += embedded.len();
            }
            self.progress
                .embedded(outcome.embedded + outcome.failed.len(), chunks.len(), &model);
        }

        Ok(outcome)
    }
}

fn to_chunk(document_id: &str, segment: Segment) -> Chunk {
    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        text: segment.text,
        sequence_index: segment.sequence_index,
        token_count: segment.token_count,
        embedding: None,
        page_number: Some(segment.page_number),
        content_hash: segment.content_hash,
    }
}
