use anyhow::Result;
use careadvisor_core_types::KnowledgeEntry;
use clap::{Args, Subcommand};

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct KnowledgeArgs {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum KnowledgeAction {
    /// Show every entry recorded for a diagnosis, strongest evidence first
    Lookup {
        /// Diagnosis name (case-insensitive)
        diagnosis: String,
    },
}

pub async fn cmd_knowledge(args: KnowledgeArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        KnowledgeAction::Lookup { diagnosis } => {
            let service = ctx.service().await?;
            let entries = service.knowledge_for(&diagnosis)?;
            emit(ctx.output(), &entries, |entries| render_human(&diagnosis, entries))
        }
    }
}

fn render_human(diagnosis: &str, entries: &[KnowledgeEntry]) -> String {
    if entries.is_empty() {
        return format!("No knowledge entries for '{diagnosis}'");
    }
    let mut lines = vec![format!("Knowledge for '{diagnosis}':")];
    for entry in entries {
        for recommendation in &entry.recommendations {
            lines.push(format!("  [{}] {}", entry.evidence_level, recommendation));
        }
    }
    lines.join("\n")
}
