use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use careadvisor_core_types::PatientRecord;
use clap::Args;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::context::CliContext;
use crate::cli::output::emit;
use crate::service::{Analysis, RecommendationSource};

#[derive(Args, Clone, Debug)]
pub struct RecommendArgs {
    /// Patient record (JSON or YAML)
    #[arg(long, value_name = "FILE")]
    pub patient: PathBuf,
}

pub async fn cmd_recommend(args: RecommendArgs, ctx: &CliContext) -> Result<()> {
    let record = read_patient(&args.patient).await?;
    let service = ctx.service().await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling analysis");
            on_interrupt.cancel();
        }
    });

    let analysis = service.analyze(&record, cancel).await;
    interrupt.abort();

    emit(ctx.output(), &analysis, render_human)
}

async fn read_patient(path: &Path) -> Result<PatientRecord> {
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    );
    let record = if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    };
    Ok(record)
}

fn render_human(analysis: &Analysis) -> String {
    let mut lines = Vec::new();
    let source = match analysis.source {
        RecommendationSource::Cache => "cache",
        RecommendationSource::Computed => "computed",
        RecommendationSource::Fallback => "fallback",
    };
    lines.push(format!(
        "Recommendations ({source}, risk {}):",
        analysis.risk_level
    ));
    for (idx, text) in analysis.recommendations.iter().enumerate() {
        match analysis.ranked.get(idx) {
            Some(ranked) => lines.push(format!("  {:>2}. {} [{:.1}]", idx + 1, text, ranked.score)),
            None => lines.push(format!("  {:>2}. {}", idx + 1, text)),
        }
    }
    if analysis.inference_degraded {
        lines.push("  (model-based retrieval unavailable; evidence and rules only)".to_string());
    }
    if let Some(reason) = &analysis.failure {
        lines.push(format!("  reason: {reason}"));
    }
    lines.join("\n")
}
