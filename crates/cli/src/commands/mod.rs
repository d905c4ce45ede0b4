//! Command handlers for the LexRAG CLI.

pub mod ask;
pub mod documents;
pub mod embeddings;
pub mod ingest;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use documents::DocumentsCommand;
pub use embeddings::EmbeddingsCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;
