use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value as JsonValue;
use tokio::fs;

use crate::cli::context::CliContext;
use crate::cli::output::{emit, OutputFormat};
use crate::config::AdvisorConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration (defaults, file and environment merged)
    Show,

    /// Get one configuration value, e.g. `cache.ttl_secs`
    Get {
        /// Configuration key
        key: String,
    },

    /// Validate the configuration file and the merged result
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            if ctx.output() == OutputFormat::Human {
                println!("Current configuration ({}):", path.display());
                print!("{}", serde_yaml::to_string(ctx.config())?);
                Ok(())
            } else {
                emit(ctx.output(), ctx.config(), |_| String::new())
            }
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => emit(ctx.output(), value, |value| render_value(value)),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Validate => {
            if fs::try_exists(&path).await? {
                let raw = fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_yaml::from_str::<AdvisorConfig>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?;
            }
            ctx.config()
                .validate()
                .context("effective configuration is invalid")?;
            if fs::try_exists(&path).await? {
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
            Ok(())
        }
    }
}

fn render_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reads_nested_keys_from_config() {
        let json = serde_json::to_value(AdvisorConfig::default()).unwrap();
        assert_eq!(
            get_json_value(&json, &["cache", "ttl_secs"]),
            Some(&JsonValue::from(86_400))
        );
        assert_eq!(
            get_json_value(&json, &["knowledge", "path"]),
            Some(&JsonValue::Null)
        );
        assert!(get_json_value(&json, &["cache", "missing"]).is_none());
        assert!(split_key("..").is_err());
    }

    #[test]
    fn values_render_without_quotes() {
        assert_eq!(render_value(&JsonValue::from("x")), "x");
        assert_eq!(render_value(&JsonValue::from(0.85)), "0.85");
    }
}
