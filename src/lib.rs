//! care-advisor library
//!
//! Cached, evidence-ranked care recommendations with a conservative fallback.

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod fallback;
pub mod rules;
pub mod scoring;
pub mod service;

pub use config::{load_config, AdvisorConfig, LoadOptions};
pub use errors::{AdvisorError, Result};
pub use fallback::fallback_recommendations;
pub use service::{
    Analysis, PipelineStage, RecommendationSource, RiskAnalysisService, ServiceComponents,
    ServiceState, ServiceStats,
};
