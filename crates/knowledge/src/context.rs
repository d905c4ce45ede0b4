//! Context assembly.
//!
//! Formats retrieved chunks into labelled context entries. The label is
//! the exact citation marker the model is asked to reproduce.

use crate::types::RetrievalResult;

/// Separator between context entries in the rendered prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Citation marker for a document page, e.g. `[Source: Civil Code, page 12]`.
pub fn source_label(document_name: &str, page_number: Option<u32>) -> String {
    match page_number {
        Some(page) => format!("[Source: {}, page {}]", document_name, page),
        None => format!("[Source: {}]", document_name),
    }
}

/// Citation marker for one retrieval result.
pub fn result_label(result: &RetrievalResult) -> String {
    source_label(&result.document_name, result.page_number)
}

/// One labelled context entry per result, in retrieval order.
pub fn format_chunks_for_context(results: &[RetrievalResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| format!("{}\n{}", result_label(result), result.text.trim()))
        .collect()
}

/// Render context entries as one prompt block.
pub fn join_context(entries: &[String]) -> String {
    entries.join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentCategory;

    fn result(name: &str, page: Option<u32>, text: &str) -> RetrievalResult {
        RetrievalResult {
            chunk_id: "c".to_string(),
            document_id: "d".to_string(),
            sequence_index: 0,
            text: text.to_string(),
            similarity: 0.8,
            document_name: name.to_string(),
            category: DocumentCategory::Legislation,
            page_number: page,
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            source_label("Civil Code", Some(12)),
            "[Source: Civil Code, page 12]"
        );
        assert_eq!(source_label("Civil Code", None), "[Source: Civil Code]");
    }

    #[test]
    fn test_format_preserves_order_and_labels() {
        let entries = format_chunks_for_context(&[
            result("Sales Act", Some(4), "  The seller delivers the goods.\n"),
            result("Ruling 7/2021", None, "The buyer pays the price."),
        ]);

        assert_eq!(
            entries,
            vec![
                "[Source: Sales Act, page 4]\nThe seller delivers the goods.".to_string(),
                "[Source: Ruling 7/2021]\nThe buyer pays the price.".to_string(),
            ]
        );
        assert_eq!(join_context(&entries).matches("---").count(), 1);
    }

    #[test]
    fn test_empty_results() {
        assert!(format_chunks_for_context(&[]).is_empty());
    }
}
