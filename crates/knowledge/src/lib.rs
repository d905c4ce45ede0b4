//! Legal-document retrieval and grounded answering.
//!
//! Documents are chunked, embedded and stored locally in SQLite; questions
//! are embedded, matched against stored chunks and answered by an LLM from
//! the retrieved excerpts only. Every answer is checked for citations and
//! quality before it is returned.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod generator;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod retriever;
pub mod store;
pub mod types;
pub mod validator;
pub mod workspace;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{
    ChunkingConfig, EmbeddingSettings, GenerationConfig, MetricsConfig, RagConfig,
    RetrievalConfig, TimeoutConfig, ValidationConfig,
};
pub use context::{format_chunks_for_context, source_label};
pub use embeddings::{EmbeddingGateway, EmbeddingProvider, TaskIntent};
pub use generator::{fallback_answer, AnswerGenerator, GeneratedAnswer};
pub use ingest::{Ingestor, ReembedReport};
pub use metrics::{MetricsAggregator, MetricsSummary, RagMetric};
pub use pipeline::{AskOutcome, AskRequest, GroundedAnswer, RagPipeline, NO_GROUNDED_ANSWER_MESSAGE};
pub use progress::{IngestPhase, ProgressCallback, ProgressEvent, ProgressReporter};
pub use retriever::VectorRetriever;
pub use store::{MemoryStore, SqliteStore, VectorStore};
pub use types::{
    Chunk, Document, DocumentCategory, EmbeddingAudit, EmbeddingFailure, IngestReport,
    NewDocument, RetrievalResult, StoreStats,
};
pub use validator::{check_answer_quality, AnswerValidationResult};
pub use workspace::RagWorkspace;
