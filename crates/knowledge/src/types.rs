//! Document, chunk and retrieval types.

use chrono::{DateTime, Utc};
use lexrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of legal document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Constitution,
    Legislation,
    Regulation,
    CaseLaw,
    Contract,
    Doctrine,
    Other,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 7] = [
        DocumentCategory::Constitution,
        DocumentCategory::Legislation,
        DocumentCategory::Regulation,
        DocumentCategory::CaseLaw,
        DocumentCategory::Contract,
        DocumentCategory::Doctrine,
        DocumentCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Constitution => "constitution",
            DocumentCategory::Legislation => "legislation",
            DocumentCategory::Regulation => "regulation",
            DocumentCategory::CaseLaw => "case_law",
            DocumentCategory::Contract => "contract",
            DocumentCategory::Doctrine => "doctrine",
            DocumentCategory::Other => "other",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        DocumentCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| {
                AppError::Other(format!(
                    "Unknown document category '{}'. Expected one of: {}",
                    s,
                    DocumentCategory::ALL.map(|c| c.as_str()).join(", ")
                ))
            })
    }
}

/// A stored legal document. Immutable except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub category: DocumentCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Where the original file lives in object storage
    pub storage_locator: String,
    pub page_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A retrievable segment of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// 0-based, contiguous within a document
    pub sequence_index: u32,
    pub token_count: u32,
    /// `None` while the chunk is unindexed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// SHA-256 of the chunk's own (non-overlap) content
    pub content_hash: String,
}

impl Chunk {
    pub fn is_indexed(&self) -> bool {
        self.embedding.is_some()
    }
}

/// One ranked retrieval match. Produced per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub document_id: String,
    pub sequence_index: u32,
    pub text: String,
    /// Cosine similarity clamped to [0, 1]
    pub similarity: f32,
    pub document_name: String,
    pub category: DocumentCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// Input to the ingestion workflow.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub category: DocumentCategory,
    pub source_url: Option<String>,
    pub storage_locator: String,
    /// Extracted text; form feeds separate pages
    pub text: String,
}

/// A chunk that could not be embedded during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingFailure {
    pub sequence_index: u32,
    pub error: String,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub document_id: String,
    pub page_count: u32,
    pub chunks_total: usize,
    pub chunks_embedded: usize,
    pub failures: Vec<EmbeddingFailure>,
    pub duration_secs: f64,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.chunks_embedded == self.chunks_total
    }
}

/// Store-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub documents: u64,
    pub chunks: u64,
    pub indexed_chunks: u64,
    pub unindexed_chunks: u64,
}

/// Stored vectors grouped by length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingAudit {
    /// vector length -> number of chunks
    pub by_length: BTreeMap<usize, u64>,
    pub unindexed: u64,
}

impl EmbeddingAudit {
    /// Lengths that differ from `expected`, with their counts.
    pub fn mismatched(&self, expected: usize) -> Vec<(usize, u64)> {
        self.by_length
            .iter()
            .filter(|(length, _)| **length != expected)
            .map(|(length, count)| (*length, *count))
            .collect()
    }

    pub fn is_consistent(&self, expected: usize) -> bool {
        self.mismatched(expected).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!(
            "case-law".parse::<DocumentCategory>().unwrap(),
            DocumentCategory::CaseLaw
        );
        assert_eq!(
            " Legislation ".parse::<DocumentCategory>().unwrap(),
            DocumentCategory::Legislation
        );
        assert_eq!(DocumentCategory::CaseLaw.to_string(), "case_law");
        assert!("memo".parse::<DocumentCategory>().is_err());
    }

    #[test]
    fn test_category_serde_matches_as_str() {
        for category in DocumentCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_retrieval_result_wire_names() {
        let result = RetrievalResult {
            chunk_id: "c1".to_string(),
            document_id: "d1".to_string(),
            sequence_index: 0,
            text: "text".to_string(),
            similarity: 0.9,
            document_name: "Civil Code".to_string(),
            category: DocumentCategory::Legislation,
            page_number: Some(2),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["documentName"], "Civil Code");
        assert_eq!(json["pageNumber"], 2);
        assert_eq!(json["category"], "legislation");
    }

    #[test]
    fn test_audit_mismatched() {
        let mut audit = EmbeddingAudit::default();
        audit.by_length.insert(768, 40);
        audit.by_length.insert(1536, 3);
        audit.by_length.insert(9714, 1);

        assert_eq!(audit.mismatched(768), vec![(1536, 3), (9714, 1)]);
        assert!(!audit.is_consistent(768));

        audit.by_length.retain(|length, _| *length == 768);
        assert!(audit.is_consistent(768));
    }
}
