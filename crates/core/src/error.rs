//! Error types for the LexRAG pipeline.
//!
//! This module defines a unified error enum. Besides the ambient categories
//! (configuration, I/O, serialization) it carries the retrieval-and-grounding
//! taxonomy: dimension-contract violations, rate limits, generation and store
//! failures, input validation and timeouts.

use std::fmt;

use thiserror::Error;

/// Generic message surfaced to end users for internal failures.
pub const GENERIC_ERROR_MESSAGE: &str = "An internal error occurred while processing the request.";

/// Pipeline stage that performs an external round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Retrieval,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Retrieval => "retrieval",
            Stage::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// Unified error type for LexRAG.
///
/// All functions in the workspace return `Result<T, AppError>`.
/// Answer validation is not represented here: it always yields a
/// structured result that the caller acts on.
#[derive(Error, Debug)]
pub enum AppError {
    /// A vector does not have the configured dimensionality.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding service refused the call for quota/rate reasons.
    #[error("Embedding service rate limited: {0}")]
    EmbeddingRateLimited(String),

    /// The generative model refused the call for quota/rate reasons.
    #[error("Generation service rate limited: {0}")]
    GenerationRateLimited(String),

    /// The generative model failed for any other reason.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Embedding service errors that are not rate limits
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The document/vector store could not be reached.
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Store-level errors (constraint violations, corrupt rows)
    #[error("Store error: {0}")]
    Store(String),

    /// Document text was empty or whitespace only.
    #[error("Document is empty: {0}")]
    EmptyDocument(String),

    /// Query text was empty or whitespace only.
    #[error("Query is empty")]
    EmptyQuery,

    /// An external call exceeded its configured deadline.
    #[error("Timed out during {stage}")]
    Timeout { stage: Stage },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error is a quota/rate-limit signal from an external service.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingRateLimited(_) | AppError::GenerationRateLimited(_)
        )
    }

    /// Whether the error was raised by input validation, before any external call.
    pub fn is_input_error(&self) -> bool {
        matches!(self, AppError::EmptyDocument(_) | AppError::EmptyQuery)
    }

    /// Message that is safe to show to end users.
    ///
    /// Input errors are described; everything else collapses to a generic
    /// internal-error message. Full detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::EmptyQuery => "The question must not be empty.".to_string(),
            AppError::EmptyDocument(_) => "The document contains no extractable text.".to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
