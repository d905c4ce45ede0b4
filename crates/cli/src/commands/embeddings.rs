//! Embeddings command handler.
//!
//! Maintenance for stored vectors: find vectors whose length drifted from
//! the configured dimensionality, clear them, and re-embed whatever is
//! unindexed.

use clap::{Args, Subcommand};
use lexrag_core::config::AppConfig;
use lexrag_knowledge::RagWorkspace;

/// Audit, repair or re-embed stored vectors
#[derive(Args, Debug)]
pub struct EmbeddingsCommand {
    #[command(subcommand)]
    pub action: EmbeddingsAction,
}

#[derive(Subcommand, Debug)]
pub enum EmbeddingsAction {
    /// Count stored vectors by length
    Audit {
        /// Clear vectors whose length differs from the configured dimensions
        #[arg(long)]
        repair: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Embed chunks that are currently unindexed
    Reembed {
        /// Maximum number of chunks to process
        #[arg(long, default_value = "500")]
        limit: usize,
    },
}

impl EmbeddingsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let workspace = RagWorkspace::open(config)?;
        let dimensions = workspace.config().embedding.dimensions;

        match &self.action {
            EmbeddingsAction::Audit { repair, json } => {
                let audit = workspace.store().embedding_dimension_audit().await?;
                let mismatched = audit.mismatched(dimensions);

                if *json {
                    let output = serde_json::json!({
                        "dimensions": dimensions,
                        "audit": audit,
                        "consistent": mismatched.is_empty(),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("Configured dimensions: {}", dimensions);
                    for (length, count) in &audit.by_length {
                        let marker = if *length == dimensions { "" } else { "  <- mismatch" };
                        println!("  length {:>5}: {} chunks{}", length, count, marker);
                    }
                    println!("  unindexed:    {} chunks", audit.unindexed);
                }

                if *repair && !mismatched.is_empty() {
                    let cleared = workspace.ingestor().repair_dimensions().await?;
                    println!(
                        "Cleared {} mismatched vectors; run `lexrag embeddings reembed` to rebuild them",
                        cleared
                    );
                }
            }
            EmbeddingsAction::Reembed { limit } => {
                let report = workspace.ingestor().reembed_unindexed(*limit).await?;
                println!(
                    "Re-embedded {}/{} chunks",
                    report.embedded, report.attempted
                );
                for chunk_id in &report.failed {
                    println!("  still unindexed: {}", chunk_id);
                }
            }
        }

        Ok(())
    }
}
