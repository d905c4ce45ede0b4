//! Ingest command handler.
//!
//! Reads plain-text documents from files or directories and runs them
//! through the ingestion workflow. Form feeds in the text mark page breaks.

use anyhow::{bail, Context};
use clap::Args;
use lexrag_core::config::AppConfig;
use lexrag_knowledge::{
    DocumentCategory, IngestReport, NewDocument, ProgressReporter, RagWorkspace,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

const INGESTIBLE_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Chunk, embed and store documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Document category (constitution, legislation, regulation, case_law, contract, doctrine, other)
    #[arg(long)]
    pub category: String,

    /// Display name (single file only; defaults to the file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Public URL of the original document (single file only)
    #[arg(long)]
    pub source_url: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let category: DocumentCategory = self.category.parse()?;
        let files = collect_files(&self.paths);
        if files.is_empty() {
            bail!("No .txt or .md files found under {:?}", self.paths);
        }
        if files.len() > 1 && (self.name.is_some() || self.source_url.is_some()) {
            bail!("--name and --source-url apply to a single file only");
        }

        tracing::info!("Ingesting {} file(s) as {}", files.len(), category);

        let workspace = RagWorkspace::open(config)?;
        let mut ingestor = workspace.ingestor();
        if !self.json {
            ingestor = ingestor.with_progress(ProgressReporter::new(Arc::new(|event| {
                eprintln!("{}", event.format_simple());
            })));
        }

        let mut reports = Vec::with_capacity(files.len());
        for path in &files {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = self.name.clone().unwrap_or_else(|| display_name(path));

            let report = ingestor
                .ingest(NewDocument {
                    name: name.clone(),
                    category,
                    source_url: self.source_url.clone(),
                    storage_locator: path.display().to_string(),
                    text,
                })
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;

            if !self.json {
                print_report(&name, &report);
            }
            reports.push(report);
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }

        Ok(())
    }
}

fn print_report(name: &str, report: &IngestReport) {
    println!(
        "{} -> {} ({} pages, {}/{} chunks embedded, {:.2}s)",
        name,
        report.document_id,
        report.page_count,
        report.chunks_embedded,
        report.chunks_total,
        report.duration_secs
    );
    for failure in &report.failures {
        println!(
            "  chunk {} left unindexed: {}",
            failure.sequence_index, failure.error
        );
    }
}

/// Ingestible files under `paths`, in a stable order.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_ingestible(e.path()))
                .map(|e| e.into_path())
        })
        .collect();
    files.dedup();
    files
}

fn is_ingestible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| INGESTIBLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace(['_', '-'], " "))
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_files_filters_extensions() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b_statute.txt"), "text").unwrap();
        std::fs::write(dir.path().join("a_notes.MD"), "text").unwrap();
        std::fs::write(dir.path().join("scan.pdf"), "binary").unwrap();
        std::fs::write(dir.path().join("nested/ruling.txt"), "text").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]);
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a_notes.MD", "b_statute.txt", "ruling.txt"]);
    }

    #[test]
    fn test_single_file_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("civil-code.txt");
        std::fs::write(&file, "text").unwrap();

        assert_eq!(collect_files(&[file.clone()]), vec![file]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("docs/civil_code-2024.txt")), "civil code 2024");
    }
}
