//! Ask command handler.
//!
//! Runs one question through the pipeline and prints the grounded answer
//! with its sources.

use anyhow::Context;
use clap::Args;
use lexrag_core::{config::AppConfig, AppError};
use lexrag_knowledge::{
    source_label, AskOutcome, AskRequest, DocumentCategory, GroundedAnswer, RagWorkspace,
    NO_GROUNDED_ANSWER_MESSAGE,
};
use std::path::PathBuf;

/// Ask a question answered from the stored documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: String,

    /// Restrict retrieval to one document category
    #[arg(long)]
    pub category: Option<String>,

    /// Maximum number of chunks to retrieve
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Minimum similarity for a chunk to be used
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// JSON file with prior turns: [{"role": "user"|"model", "content": "..."}]
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::debug!("Ask command options: {:?}", self);

        let mut request = AskRequest::new(&self.query);
        if let Some(category) = &self.category {
            request = request.with_category(category.parse::<DocumentCategory>()?);
        }
        if let Some(limit) = self.limit {
            request = request.with_limit(limit);
        }
        if let Some(threshold) = self.threshold {
            request = request.with_threshold(threshold);
        }
        if let Some(path) = &self.history {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?;
            let history = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid history file {}", path.display()))?;
            request = request.with_history(history);
        }

        let workspace = RagWorkspace::open(config)?;
        let outcome = workspace
            .pipeline()
            .ask(request)
            .await
            .map_err(user_facing_error)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            return Ok(());
        }

        match outcome {
            AskOutcome::NoGroundedAnswer { .. } => println!("{}", NO_GROUNDED_ANSWER_MESSAGE),
            AskOutcome::Answered(answer) => print_answer(&answer),
        }

        Ok(())
    }
}

/// The pipeline has already logged the full error; the caller only sees
/// its public message.
fn user_facing_error(err: AppError) -> anyhow::Error {
    tracing::debug!("Ask failed: {}", err);
    anyhow::anyhow!(err.public_message())
}

fn print_answer(answer: &GroundedAnswer) {
    println!("{}", answer.answer.trim_end());
    println!();

    println!("Sources:");
    for source in &answer.sources {
        println!(
            "- {} (similarity {:.3}, {})",
            source_label(&source.document_name, source.page_number),
            source.similarity,
            source.category
        );
    }

    if answer.fallback_used {
        eprintln!("note: generation quota exhausted, showing matching sources only");
    }
    if !answer.validation.valid {
        eprintln!("warning: the answer did not pass quality checks:");
        for issue in &answer.validation.issues {
            eprintln!("  - {}", issue);
        }
    }
    tracing::debug!(
        "model={} latency={}ms citations={} repairs={}",
        answer.model,
        answer.latency_ms,
        answer.validation.citation_count,
        answer.repair_attempts
    );
}
