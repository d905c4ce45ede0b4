//! LexRAG Core Library
//!
//! Foundational utilities shared by every LexRAG crate:
//! - Error taxonomy (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult, Stage};
