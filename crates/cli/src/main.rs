//! LexRAG CLI
//!
//! Ingest legal documents into the local store and ask grounded questions
//! about them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DocumentsCommand, EmbeddingsCommand, IngestCommand, StatsCommand};
use lexrag_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// LexRAG - grounded answers over your legal documents
#[derive(Parser, Debug)]
#[command(name = "lexrag")]
#[command(about = "Grounded question answering over legal documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "LEXRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "LEXRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Generation provider (gemini, ollama, mock)
    #[arg(short, long, global = true, env = "LEXRAG_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "LEXRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chunk, embed and store documents
    Ingest(IngestCommand),

    /// Ask a question answered from the stored documents
    Ask(AskCommand),

    /// List or delete stored documents
    Documents(DocumentsCommand),

    /// Audit, repair or re-embed stored vectors
    Embeddings(EmbeddingsCommand),

    /// Show store statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        None,
        None,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.json_logs {
        config.json_logs = true;
    }

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Documents(_) => "documents",
        Commands::Embeddings(_) => "embeddings",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Documents(cmd) => cmd.execute(&config).await,
        Commands::Embeddings(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::debug!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
