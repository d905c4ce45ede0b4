//! In-memory store used by tests and offline runs.

use super::{cosine_similarity, rank_results, VectorStore};
use crate::embeddings::check_dimensions;
use crate::types::{
    Chunk, Document, DocumentCategory, EmbeddingAudit, RetrievalResult, StoreStats,
};
use lexrag_core::{AppError, AppResult};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<String, Document>,
    chunks: HashMap<String, Chunk>,
}

impl Tables {
    fn chunks_of<'a>(&'a self, document_id: &'a str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.chunks
            .values()
            .filter(move |chunk| chunk.document_id == document_id)
    }
}

/// Store backed by two hash maps behind a single `RwLock`.
#[derive(Debug)]
pub struct MemoryStore {
    dimensions: usize,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Write a vector without the dimension check, to reproduce drift.
    #[cfg(test)]
    pub(crate) async fn force_embedding(&self, chunk_id: &str, embedding: Vec<f32>) {
        if let Some(chunk) = self.tables.write().await.chunks.get_mut(chunk_id) {
            chunk.embedding = Some(embedding);
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn insert_document(&self, document: &Document) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if tables.documents.contains_key(&document.id) {
            return Err(AppError::Store(format!(
                "Document {} already exists",
                document.id
            )));
        }
        tables
            .documents
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        for chunk in chunks {
            if !tables.documents.contains_key(&chunk.document_id) {
                return Err(AppError::Store(format!(
                    "Chunk {} references unknown document {}",
                    chunk.id, chunk.document_id
                )));
            }
            let duplicate = tables.chunks_of(&chunk.document_id).any(|existing| {
                existing.sequence_index == chunk.sequence_index
            });
            if duplicate || tables.chunks.contains_key(&chunk.id) {
                return Err(AppError::Store(format!(
                    "Chunk {} (sequence {}) already exists",
                    chunk.id, chunk.sequence_index
                )));
            }
        }

        for chunk in chunks {
            let mut stored = chunk.clone();
            stored.embedding = None;
            tables.chunks.insert(stored.id.clone(), stored);
        }
        Ok(())
    }

    async fn attach_embeddings(&self, embeddings: &[(String, Vec<f32>)]) -> AppResult<()> {
        let mut tables = self.tables.write().await;

        for (chunk_id, vector) in embeddings {
            check_dimensions(vector, self.dimensions)?;
            if !tables.chunks.contains_key(chunk_id) {
                return Err(AppError::Store(format!("Unknown chunk {}", chunk_id)));
            }
        }

        for (chunk_id, vector) in embeddings {
            if let Some(chunk) = tables.chunks.get_mut(chunk_id) {
                chunk.embedding = Some(vector.clone());
            }
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f32,
        category: Option<DocumentCategory>,
        limit: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        let tables = self.tables.read().await;
        let mut results = Vec::new();

        for chunk in tables.chunks.values() {
            let Some(embedding) = chunk.embedding.as_ref() else {
                continue;
            };
            let Some(document) = tables.documents.get(&chunk.document_id) else {
                continue;
            };
            if category.is_some_and(|wanted| wanted != document.category) {
                continue;
            }

            let similarity = cosine_similarity(query, embedding)?;
            results.push(RetrievalResult {
                chunk_id: chunk.id.clone(),
                document_id: chunk.document_id.clone(),
                sequence_index: chunk.sequence_index,
                text: chunk.text.clone(),
                similarity,
                document_name: document.name.clone(),
                category: document.category,
                page_number: chunk.page_number,
            });
        }

        Ok(rank_results(results, threshold, limit))
    }

    async fn get_document(&self, id: &str) -> AppResult<Option<Document>> {
        Ok(self.tables.read().await.documents.get(id).cloned())
    }

    async fn list_documents(&self, category: Option<DocumentCategory>) -> AppResult<Vec<Document>> {
        let tables = self.tables.read().await;
        let mut documents: Vec<Document> = tables
            .documents
            .values()
            .filter(|doc| category.is_none_or(|wanted| wanted == doc.category))
            .cloned()
            .collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(documents)
    }

    async fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        let tables = self.tables.read().await;
        let mut chunks: Vec<Chunk> = tables.chunks_of(document_id).cloned().collect();
        chunks.sort_by_key(|chunk| chunk.sequence_index);
        Ok(chunks)
    }

    async fn unindexed_chunks(&self, limit: usize) -> AppResult<Vec<Chunk>> {
        let tables = self.tables.read().await;
        let mut pending: Vec<(&Document, &Chunk)> = tables
            .chunks
            .values()
            .filter(|chunk| chunk.embedding.is_none())
            .filter_map(|chunk| {
                tables
                    .documents
                    .get(&chunk.document_id)
                    .map(|doc| (doc, chunk))
            })
            .collect();

        pending.sort_by(|(doc_a, a), (doc_b, b)| {
            doc_a
                .created_at
                .cmp(&doc_b.created_at)
                .then(a.document_id.cmp(&b.document_id))
                .then(a.sequence_index.cmp(&b.sequence_index))
        });

        Ok(pending
            .into_iter()
            .take(limit)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.documents.remove(id).is_none() {
            return Ok(false);
        }
        tables.chunks.retain(|_, chunk| chunk.document_id != id);
        Ok(true)
    }

    async fn clear_embeddings(&self, chunk_ids: &[String]) -> AppResult<usize> {
        let mut tables = self.tables.write().await;
        let mut cleared = 0;
        for chunk_id in chunk_ids {
            if let Some(chunk) = tables.chunks.get_mut(chunk_id) {
                if chunk.embedding.take().is_some() {
                    cleared += 1;
                }
            }
        }
        Ok(cleared)
    }

    async fn mismatched_chunk_ids(&self, expected: usize) -> AppResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut ids: Vec<String> = tables
            .chunks
            .values()
            .filter(|chunk| {
                chunk
                    .embedding
                    .as_ref()
                    .is_some_and(|vector| vector.len() != expected)
            })
            .map(|chunk| chunk.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn embedding_dimension_audit(&self) -> AppResult<EmbeddingAudit> {
        let tables = self.tables.read().await;
        let mut audit = EmbeddingAudit::default();
        for chunk in tables.chunks.values() {
            match &chunk.embedding {
                Some(vector) => *audit.by_length.entry(vector.len()).or_insert(0) += 1,
                None => audit.unindexed += 1,
            }
        }
        Ok(audit)
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let tables = self.tables.read().await;
        let indexed = tables
            .chunks
            .values()
            .filter(|chunk| chunk.is_indexed())
            .count() as u64;
        let chunks = tables.chunks.len() as u64;

        Ok(StoreStats {
            documents: tables.documents.len() as u64,
            chunks,
            indexed_chunks: indexed,
            unindexed_chunks: chunks - indexed,
        })
    }
}
