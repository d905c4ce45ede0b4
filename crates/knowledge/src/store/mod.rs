//! Document and vector store.
//!
//! The [`VectorStore`] trait is the narrow interface the pipeline needs
//! from persistence: exact-match filtered reads, bulk chunk writes and a
//! similarity-search primitive. Two backends ship with the crate.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::types::{
    Chunk, Document, DocumentCategory, EmbeddingAudit, RetrievalResult, StoreStats,
};
use lexrag_core::{AppError, AppResult};
use std::cmp::Ordering;

/// Persistence for documents, chunks and their embeddings.
///
/// Implementations hold the configured dimensionality and refuse to store
/// a vector of any other length.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimensionality accepted by `attach_embeddings`.
    fn dimensions(&self) -> usize;

    async fn insert_document(&self, document: &Document) -> AppResult<()>;

    /// Bulk insert; chunks are stored unindexed regardless of `embedding`.
    async fn insert_chunks(&self, chunks: &[Chunk]) -> AppResult<()>;

    /// Set embeddings for existing chunks, all or nothing.
    async fn attach_embeddings(&self, embeddings: &[(String, Vec<f32>)]) -> AppResult<()>;

    /// Indexed chunks with similarity >= `threshold`, best first, at most `limit`.
    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f32,
        category: Option<DocumentCategory>,
        limit: usize,
    ) -> AppResult<Vec<RetrievalResult>>;

    async fn get_document(&self, id: &str) -> AppResult<Option<Document>>;

    async fn list_documents(&self, category: Option<DocumentCategory>) -> AppResult<Vec<Document>>;

    /// Chunks of one document in sequence order.
    async fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>>;

    /// Chunks without an embedding, oldest document first.
    async fn unindexed_chunks(&self, limit: usize) -> AppResult<Vec<Chunk>>;

    /// Delete a document and its chunks. Returns false if it did not exist.
    async fn delete_document(&self, id: &str) -> AppResult<bool>;

    /// Reset embeddings to null. Returns the number of chunks changed.
    async fn clear_embeddings(&self, chunk_ids: &[String]) -> AppResult<usize>;

    /// Ids of indexed chunks whose vector length differs from `expected`.
    async fn mismatched_chunk_ids(&self, expected: usize) -> AppResult<Vec<String>>;

    async fn embedding_dimension_audit(&self) -> AppResult<EmbeddingAudit>;

    async fn stats(&self) -> AppResult<StoreStats>;
}

/// Cosine similarity clamped to [0, 1].
///
/// Vectors of different length are a configuration error, never a zero score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> AppResult<f32> {
    if a.len() != b.len() {
        return Err(AppError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot_product / (norm_a * norm_b)).clamp(0.0, 1.0))
}

/// Deterministic result order: similarity descending, then sequence
/// index ascending, then document id.
pub fn compare_results(a: &RetrievalResult, b: &RetrievalResult) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.sequence_index.cmp(&b.sequence_index))
        .then_with(|| a.document_id.cmp(&b.document_id))
}

/// Drop results below `threshold`, order them and keep the first `limit`.
pub fn rank_results(
    mut results: Vec<RetrievalResult>,
    threshold: f32,
    limit: usize,
) -> Vec<RetrievalResult> {
    results.retain(|result| result.similarity >= threshold);
    results.sort_by(compare_results);
    results.truncate(limit);
    results
}
