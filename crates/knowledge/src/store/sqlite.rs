//! SQLite-backed document and vector store.
//!
//! Embeddings are stored as little-endian f32 BLOBs. A NULL embedding marks
//! an unindexed chunk. Similarity is computed in-process over the rows that
//! pass the exact-match filters.

use super::{cosine_similarity, rank_results, VectorStore};
use crate::embeddings::check_dimensions;
use crate::types::{
    Chunk, Document, DocumentCategory, EmbeddingAudit, RetrievalResult, StoreStats,
};
use chrono::{DateTime, Utc};
use lexrag_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        source_url TEXT,
        storage_locator TEXT NOT NULL,
        page_count INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        sequence_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        token_count INTEGER NOT NULL,
        page_number INTEGER,
        content_hash TEXT NOT NULL,
        embedding BLOB,
        UNIQUE (document_id, sequence_index)
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
    CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);
"#;

const CHUNK_COLUMNS: &str =
    "c.id, c.document_id, c.text, c.sequence_index, c.token_count, c.embedding, c.page_number, c.content_hash";

const DOCUMENT_COLUMNS: &str =
    "id, name, category, source_url, storage_locator, page_count, created_at";

/// Store backed by a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    dimensions: usize,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path, dimensions: usize) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::RetrievalUnavailable(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| {
            AppError::RetrievalUnavailable(format!(
                "Failed to open SQLite store at {}: {}",
                db_path.display(),
                e
            ))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_error("Failed to enable foreign keys"))?;
        conn.execute_batch(SCHEMA)
            .map_err(store_error("Failed to create tables"))?;

        tracing::debug!("Opened SQLite store at {:?}", db_path);
        Ok(Self {
            dimensions,
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn store_error(context: &'static str) -> impl Fn(rusqlite::Error) -> AppError {
    move |e| AppError::Store(format!("{}: {}", context, e))
}

/// Convert embedding vector to bytes for storage.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Convert bytes back to embedding vector.
fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Store(format!(
            "Invalid embedding blob of {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

struct DocumentRow {
    id: String,
    name: String,
    category: String,
    source_url: Option<String>,
    storage_locator: String,
    page_count: i64,
    created_at: String,
}

impl DocumentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            source_url: row.get(3)?,
            storage_locator: row.get(4)?,
            page_count: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_document(self) -> AppResult<Document> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| AppError::Store(format!("Corrupt timestamp on {}: {}", self.id, e)))?
            .with_timezone(&Utc);

        Ok(Document {
            category: self.category.parse()?,
            id: self.id,
            name: self.name,
            source_url: self.source_url,
            storage_locator: self.storage_locator,
            page_count: self.page_count as u32,
            created_at,
        })
    }
}

struct ChunkRow {
    id: String,
    document_id: String,
    text: String,
    sequence_index: i64,
    token_count: i64,
    embedding: Option<Vec<u8>>,
    page_number: Option<i64>,
    content_hash: String,
}

impl ChunkRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            document_id: row.get(1)?,
            text: row.get(2)?,
            sequence_index: row.get(3)?,
            token_count: row.get(4)?,
            embedding: row.get(5)?,
            page_number: row.get(6)?,
            content_hash: row.get(7)?,
        })
    }

    fn into_chunk(self) -> AppResult<Chunk> {
        let embedding = self
            .embedding
            .as_deref()
            .map(bytes_to_embedding)
            .transpose()?;

        Ok(Chunk {
            id: self.id,
            document_id: self.document_id,
            text: self.text,
            sequence_index: self.sequence_index as u32,
            token_count: self.token_count as u32,
            embedding,
            page_number: self.page_number.map(|p| p as u32),
            content_hash: self.content_hash,
        })
    }
}

fn collect_chunks(rows: Vec<ChunkRow>) -> AppResult<Vec<Chunk>> {
    rows.into_iter().map(ChunkRow::into_chunk).collect()
}

#[async_trait::async_trait]
impl VectorStore for SqliteStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn insert_document(&self, document: &Document) -> AppResult<()> {
        self.conn()
            .execute(
                "INSERT INTO documents (id, name, category, source_url, storage_locator, page_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    document.id,
                    document.name,
                    document.category.as_str(),
                    document.source_url,
                    document.storage_locator,
                    document.page_count as i64,
                    document.created_at.to_rfc3339(),
                ],
            )
            .map_err(store_error("Failed to insert document"))?;
        Ok(())
    }

    async fn insert_chunks(&self, chunks: &[Chunk]) -> AppResult<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(store_error("Failed to begin transaction"))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (id, document_id, sequence_index, text, token_count, page_number, content_hash, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
                )
                .map_err(store_error("Failed to prepare chunk insert"))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id,
                    chunk.document_id,
                    chunk.sequence_index as i64,
                    chunk.text,
                    chunk.token_count as i64,
                    chunk.page_number.map(|p| p as i64),
                    chunk.content_hash,
                ])
                .map_err(store_error("Failed to insert chunk"))?;
            }
        }

        tx.commit().map_err(store_error("Failed to commit chunks"))?;
        Ok(())
    }

    async fn attach_embeddings(&self, embeddings: &[(String, Vec<f32>)]) -> AppResult<()> {
        for (_, vector) in embeddings {
            check_dimensions(vector, self.dimensions)?;
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(store_error("Failed to begin transaction"))?;

        {
            let mut stmt = tx
                .prepare("UPDATE chunks SET embedding = ?1 WHERE id = ?2")
                .map_err(store_error("Failed to prepare embedding update"))?;

            for (chunk_id, vector) in embeddings {
                let changed = stmt
                    .execute(params![embedding_to_bytes(vector), chunk_id])
                    .map_err(store_error("Failed to attach embedding"))?;
                if changed == 0 {
                    return Err(AppError::Store(format!("Unknown chunk {}", chunk_id)));
                }
            }
        }

        tx.commit()
            .map_err(store_error("Failed to commit embeddings"))?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        threshold: f32,
        category: Option<DocumentCategory>,
        limit: usize,
    ) -> AppResult<Vec<RetrievalResult>> {
        let rows: Vec<(ChunkRow, String, String)> = {
            let conn = self.conn();
            let sql = format!(
                "SELECT {}, d.name, d.category FROM chunks c
                 JOIN documents d ON d.id = c.document_id
                 WHERE c.embedding IS NOT NULL AND (?1 IS NULL OR d.category = ?1)",
                CHUNK_COLUMNS
            );
            let mut stmt = conn.prepare(&sql).map_err(|e| {
                AppError::RetrievalUnavailable(format!("Failed to prepare similarity query: {}", e))
            })?;

            let mapped = stmt
                .query_map(params![category.map(|c| c.as_str())], |row| {
                    Ok((ChunkRow::read(row)?, row.get(8)?, row.get(9)?))
                })
                .map_err(|e| {
                    AppError::RetrievalUnavailable(format!("Similarity query failed: {}", e))
                })?;

            mapped
                .collect::<rusqlite::Result<_>>()
                .map_err(store_error("Failed to read chunk row"))?
        };

        let mut results = Vec::with_capacity(rows.len());
        for (row, document_name, category) in rows {
            let chunk = row.into_chunk()?;
            let Some(embedding) = chunk.embedding.as_ref() else {
                continue;
            };
            let similarity = cosine_similarity(query, embedding)?;

            results.push(RetrievalResult {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                sequence_index: chunk.sequence_index,
                text: chunk.text,
                similarity,
                document_name,
                category: category.parse()?,
                page_number: chunk.page_number,
            });
        }

        let scanned = results.len();
        let ranked = rank_results(results, threshold, limit);
        tracing::debug!(
            "Scanned {} indexed chunks, {} above threshold {:.2}",
            scanned,
            ranked.len(),
            threshold
        );
        Ok(ranked)
    }

    async fn get_document(&self, id: &str) -> AppResult<Option<Document>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id],
                DocumentRow::read,
            )
            .optional()
            .map_err(store_error("Failed to load document"))?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn list_documents(&self, category: Option<DocumentCategory>) -> AppResult<Vec<Document>> {
        let rows: Vec<DocumentRow> = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM documents WHERE (?1 IS NULL OR category = ?1)
                     ORDER BY created_at, id",
                    DOCUMENT_COLUMNS
                ))
                .map_err(store_error("Failed to prepare document listing"))?;
            let mapped = stmt
                .query_map(params![category.map(|c| c.as_str())], DocumentRow::read)
                .map_err(store_error("Failed to list documents"))?;
            mapped
                .collect::<rusqlite::Result<_>>()
                .map_err(store_error("Failed to read document row"))?
        };

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    async fn document_chunks(&self, document_id: &str) -> AppResult<Vec<Chunk>> {
        let rows: Vec<ChunkRow> = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM chunks c WHERE c.document_id = ?1 ORDER BY c.sequence_index",
                    CHUNK_COLUMNS
                ))
                .map_err(store_error("Failed to prepare chunk listing"))?;
            let mapped = stmt
                .query_map(params![document_id], ChunkRow::read)
                .map_err(store_error("Failed to list chunks"))?;
            mapped
                .collect::<rusqlite::Result<_>>()
                .map_err(store_error("Failed to read chunk row"))?
        };

        collect_chunks(rows)
    }

    async fn unindexed_chunks(&self, limit: usize) -> AppResult<Vec<Chunk>> {
        let rows: Vec<ChunkRow> = {
            let conn = self.conn();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM chunks c JOIN documents d ON d.id = c.document_id
                     WHERE c.embedding IS NULL
                     ORDER BY d.created_at, c.document_id, c.sequence_index
                     LIMIT ?1",
                    CHUNK_COLUMNS
                ))
                .map_err(store_error("Failed to prepare unindexed query"))?;
            let mapped = stmt
                .query_map(params![limit as i64], ChunkRow::read)
                .map_err(store_error("Failed to query unindexed chunks"))?;
            mapped
                .collect::<rusqlite::Result<_>>()
                .map_err(store_error("Failed to read chunk row"))?
        };

        collect_chunks(rows)
    }

    async fn delete_document(&self, id: &str) -> AppResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(store_error("Failed to delete document"))?;
        Ok(deleted > 0)
    }

    async fn clear_embeddings(&self, chunk_ids: &[String]) -> AppResult<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(store_error("Failed to begin transaction"))?;

        let mut cleared = 0;
        {
            let mut stmt = tx
                .prepare("UPDATE chunks SET embedding = NULL WHERE id = ?1 AND embedding IS NOT NULL")
                .map_err(store_error("Failed to prepare embedding reset"))?;
            for chunk_id in chunk_ids {
                cleared += stmt
                    .execute(params![chunk_id])
                    .map_err(store_error("Failed to clear embedding"))?;
            }
        }

        tx.commit().map_err(store_error("Failed to commit reset"))?;
        Ok(cleared)
    }

    async fn mismatched_chunk_ids(&self, expected: usize) -> AppResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id FROM chunks
                 WHERE embedding IS NOT NULL AND length(embedding) != ?1
                 ORDER BY id",
            )
            .map_err(store_error("Failed to prepare dimension query"))?;
        let ids = stmt
            .query_map(params![(expected * 4) as i64], |row| row.get(0))
            .map_err(store_error("Failed to query drifted chunks"))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(store_error("Failed to read chunk id"))?;
        Ok(ids)
    }

    async fn embedding_dimension_audit(&self) -> AppResult<EmbeddingAudit> {
        let conn = self.conn();
        let mut audit = EmbeddingAudit::default();

        let mut stmt = conn
            .prepare(
                "SELECT length(embedding) / 4, COUNT(*) FROM chunks
                 WHERE embedding IS NOT NULL GROUP BY length(embedding)",
            )
            .map_err(store_error("Failed to prepare audit query"))?;
        let groups = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))
            .map_err(store_error("Failed to audit embeddings"))?;
        for group in groups {
            let (length, count) = group.map_err(store_error("Failed to read audit row"))?;
            *audit.by_length.entry(length as usize).or_insert(0) += count as u64;
        }

        audit.unindexed = conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE embedding IS NULL",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(store_error("Failed to count unindexed chunks"))? as u64;

        Ok(audit)
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let conn = self.conn();
        let count = |sql: &str| -> AppResult<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|v| v as u64)
                .map_err(store_error("Failed to collect stats"))
        };

        let chunks = count("SELECT COUNT(*) FROM chunks")?;
        let indexed = count("SELECT COUNT(*) FROM chunks WHERE embedding IS NOT NULL")?;

        Ok(StoreStats {
            documents: count("SELECT COUNT(*) FROM documents")?,
            chunks,
            indexed_chunks: indexed,
            unindexed_chunks: chunks - indexed,
        })
    }
}
