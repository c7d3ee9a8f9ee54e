use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{self, AdvisorConfig};

pub fn init_logging(level: &str, debug: bool) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

pub struct LoadedConfig {
    pub config: AdvisorConfig,
    pub path: PathBuf,
}

/// `--config`, then ./config/care-advisor.yaml, then the user config dir.
pub fn resolve_config_path(explicit: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.clone());
    }
    let local_config = PathBuf::from("config/care-advisor.yaml");
    if local_config.exists() {
        return Ok(local_config);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("care-advisor");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = resolve_config_path(config_path)?;
    if path.exists() {
        info!("Loading configuration from: {}", path.display());
    } else {
        warn!(
            "Config file not found, using defaults: {}",
            path.display()
        );
    }

    let file = path.clone();
    let config = tokio::task::spawn_blocking(move || config::load_config(Some(file.as_path())))
        .await
        .context("configuration loader panicked")?
        .with_context(|| format!("loading configuration from {}", path.display()))?;

    Ok(LoadedConfig { config, path })
}
