//! Documents command handler.

use anyhow::bail;
use clap::{Args, Subcommand};
use lexrag_core::config::AppConfig;
use lexrag_knowledge::{DocumentCategory, RagWorkspace};

/// List or delete stored documents
#[derive(Args, Debug)]
pub struct DocumentsCommand {
    #[command(subcommand)]
    pub action: DocumentsAction,
}

#[derive(Subcommand, Debug)]
pub enum DocumentsAction {
    /// List stored documents
    List {
        /// Only documents of this category
        #[arg(long)]
        category: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a document and all of its chunks
    Delete {
        /// Document id
        id: String,
    },
}

impl DocumentsCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let workspace = RagWorkspace::open(config)?;
        let store = workspace.store();

        match &self.action {
            DocumentsAction::List { category, json } => {
                let category = category
                    .as_deref()
                    .map(str::parse::<DocumentCategory>)
                    .transpose()?;
                let documents = store.list_documents(category).await?;

                if *json {
                    println!("{}", serde_json::to_string_pretty(&documents)?);
                } else if documents.is_empty() {
                    println!("No documents stored");
                } else {
                    for document in &documents {
                        println!(
                            "{}  {:<12} {:>4} pages  {}",
                            document.id,
                            document.category.as_str(),
                            document.page_count,
                            document.name
                        );
                    }
                }
            }
            DocumentsAction::Delete { id } => {
                if !store.delete_document(id).await? {
                    bail!("Document '{}' not found", id);
                }
                println!("Deleted document {}", id);
            }
        }

        Ok(())
    }
}
