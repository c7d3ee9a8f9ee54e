use std::path::PathBuf;

use anyhow::{Context, Result};
use careadvisor_core_types::FeedbackRecord;
use clap::{Args, Subcommand};
use feedback_store::{FeedbackStatsSnapshot, StoredFeedback};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use crate::cli::context::CliContext;
use crate::cli::output::emit;

#[derive(Args, Clone, Debug)]
pub struct FeedbackArgs {
    #[command(subcommand)]
    pub action: FeedbackAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum FeedbackAction {
    /// Record feedback from a JSON file holding one record or a list
    Submit {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },

    /// Show feedback store counters
    Stats,

    /// Show the most recent feedback records
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedbackPayload {
    Many(Vec<FeedbackRecord>),
    One(FeedbackRecord),
}

impl FeedbackPayload {
    fn into_records(self) -> Vec<FeedbackRecord> {
        match self {
            FeedbackPayload::Many(records) => records,
            FeedbackPayload::One(record) => vec![record],
        }
    }
}

pub async fn cmd_feedback(args: FeedbackArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        FeedbackAction::Submit { file } => {
            let raw = fs::read_to_string(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let payload: FeedbackPayload = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;
            if ctx.config().feedback.persist_path.is_none() {
                warn!("feedback.persist_path is not set; submitted feedback will not outlive this process");
            }

            let service = ctx.service().await?;
            let mut stored = Vec::new();
            for record in payload.into_records() {
                stored.push(service.submit_feedback(record).await?);
            }
            emit(ctx.output(), &stored, |stored| {
                format!("Recorded {} feedback record(s)", stored.len())
            })
        }
        FeedbackAction::Stats => {
            let service = ctx.service().await?;
            let stats = service.feedback_stats();
            emit(ctx.output(), &stats, render_stats)
        }
        FeedbackAction::List { limit } => {
            let service = ctx.service().await?;
            let records = service.feedback_store().list(Some(limit));
            emit(ctx.output(), &records, |records| render_list(records))
        }
    }
}

fn render_stats(stats: &FeedbackStatsSnapshot) -> String {
    format!(
        "Feedback store: {}/{} records ({} effective)\n  recorded: {}\n  dropped:  {}\n  lookups:  {} ({} with matches)",
        stats.current_records,
        stats.capacity,
        stats.effective_records,
        stats.recorded,
        stats.dropped,
        stats.lookups,
        stats.hit_lookups
    )
}

fn render_list(records: &[StoredFeedback]) -> String {
    if records.is_empty() {
        return "No feedback recorded".to_string();
    }
    let mut lines = Vec::with_capacity(records.len());
    for stored in records {
        let r = &stored.record;
        let outcome = if r.effective { "effective" } else { "not effective" };
        let mut line = format!(
            "#{} {} age {} risk {} [{}] {}",
            stored.id,
            r.recorded_at.format("%Y-%m-%d %H:%M"),
            r.age,
            r.risk_level,
            r.diagnosis.join(", "),
            outcome,
        );
        if !r.notes.is_empty() {
            line.push_str(": ");
            line.push_str(&r.notes);
        }
        lines.push(line);
    }
    lines.join("\n")
}
