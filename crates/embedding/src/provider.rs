use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    #[error("embedding circuit open; skipping call")]
    CircuitOpen,
    #[error("embedding provider error: {0}")]
    Provider(String),
}

impl EmbeddingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EmbeddingError::Timeout { .. })
    }
}

/// Converts descriptive text into a fixed-length vector.
///
/// Implementations may be slow and may fail. Callers go through
/// [`crate::GuardedEmbedder`] rather than calling this directly.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Called once at service start; the default does nothing.
    async fn warm_up(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}
