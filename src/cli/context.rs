use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use crate::cli::output::OutputFormat;
use crate::config::AdvisorConfig;
use crate::service::RiskAnalysisService;

pub struct CliContext {
    config: Arc<AdvisorConfig>,
    config_path: PathBuf,
    output: OutputFormat,
    service: OnceCell<Arc<RiskAnalysisService>>,
}

impl CliContext {
    pub fn new(config: AdvisorConfig, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            service: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// The initialized service, built on first use.
    pub async fn service(&self) -> Result<Arc<RiskAnalysisService>> {
        self.service
            .get_or_try_init(|| async {
                let service = RiskAnalysisService::from_config(self.config().clone())
                    .context("building risk analysis service")?;
                service
                    .init()
                    .await
                    .context("initializing risk analysis service")?;
                Ok::<_, anyhow::Error>(Arc::new(service))
            })
            .await
            .map(Arc::clone)
    }

    pub fn shutdown(&self) {
        if let Some(service) = self.service.get() {
            service.shutdown();
        }
    }
}
