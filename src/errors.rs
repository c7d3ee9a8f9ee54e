//! Error handling for the recommendation pipeline.
//!
//! Nothing here escapes `generate_recommendations`: every variant is logged
//! and turned into the fallback list. The error type still matters for logs,
//! for `init`, and for callers using the fallible entry points.

use embedding_provider::EmbeddingError;
use feedback_store::FeedbackError;
use knowledge_base::KnowledgeError;
use recommendation_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("service initialization failed: {0}")]
    Initialization(String),

    #[error("service is not ready")]
    NotReady,

    #[error("invalid patient record: {0}")]
    InvalidRecord(String),

    #[error("inference timed out after {timeout_ms}ms")]
    InferenceTimeout { timeout_ms: u64 },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("recommendations failed validation with {} conflict(s)", .conflicts.len())]
    ValidationConflict { conflicts: Vec<String> },

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AdvisorError>;

impl From<EmbeddingError> for AdvisorError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::Timeout { timeout_ms } => AdvisorError::InferenceTimeout { timeout_ms },
            other => AdvisorError::Inference(other.to_string()),
        }
    }
}

impl From<KnowledgeError> for AdvisorError {
    fn from(err: KnowledgeError) -> Self {
        AdvisorError::Initialization(err.to_string())
    }
}

impl From<CacheError> for AdvisorError {
    fn from(err: CacheError) -> Self {
        AdvisorError::CacheUnavailable(err.to_string())
    }
}

impl From<FeedbackError> for AdvisorError {
    fn from(err: FeedbackError) -> Self {
        AdvisorError::Initialization(format!("feedback store: {err}"))
    }
}

impl AdvisorError {
    /// Short machine-readable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AdvisorError::Initialization(_) => "initialization",
            AdvisorError::NotReady => "not_ready",
            AdvisorError::InvalidRecord(_) => "invalid_record",
            AdvisorError::InferenceTimeout { .. } => "inference_timeout",
            AdvisorError::Inference(_) => "inference",
            AdvisorError::ValidationConflict { .. } => "validation_conflict",
            AdvisorError::CacheUnavailable(_) => "cache_unavailable",
            AdvisorError::Cancelled => "cancelled",
            AdvisorError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_timeout_maps_to_inference_timeout() {
        let err: AdvisorError = EmbeddingError::Timeout { timeout_ms: 500 }.into();
        assert!(matches!(err, AdvisorError::InferenceTimeout { timeout_ms: 500 }));
        let err: AdvisorError = EmbeddingError::CircuitOpen.into();
        assert_eq!(err.kind(), "inference");
    }

    #[test]
    fn conflict_message_counts_conflicts() {
        let err = AdvisorError::ValidationConflict {
            conflicts: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "recommendations failed validation with 2 conflict(s)"
        );
    }
}
