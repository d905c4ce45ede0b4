//! Stats command handler.

use clap::Args;
use lexrag_core::config::AppConfig;
use lexrag_knowledge::RagWorkspace;

/// Show store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let workspace = RagWorkspace::open(config)?;
        let stats = workspace.store().stats().await?;
        let db_size_bytes = std::fs::metadata(config.store_path())
            .map(|m| m.len())
            .unwrap_or(0);

        if self.json {
            let output = serde_json::json!({
                "store": stats,
                "dbSizeBytes": db_size_bytes,
                "dimensions": workspace.config().embedding.dimensions,
                "embeddingModel": workspace.gateway().provider().model_name(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Store: {}", config.store_path().display());
            println!("  Documents: {}", stats.documents);
            println!(
                "  Chunks: {} ({} indexed, {} unindexed)",
                stats.chunks, stats.indexed_chunks, stats.unindexed_chunks
            );
            println!("  DB size: {} bytes", db_size_bytes);
            println!(
                "  Embeddings: {} ({} dimensions)",
                workspace.gateway().provider().model_name(),
                workspace.config().embedding.dimensions
            );
        }

        Ok(())
    }
}
