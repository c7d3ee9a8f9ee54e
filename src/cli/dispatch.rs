use super::config::cmd_config;
use super::env::CliArgs;
use super::feedback::cmd_feedback;
use super::knowledge::cmd_knowledge;
use super::recommend::cmd_recommend;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Recommend(args) => cmd_recommend(args, ctx).await,
        Commands::Feedback(args) => cmd_feedback(args, ctx).await,
        Commands::Knowledge(args) => cmd_knowledge(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
