use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::provider::{EmbeddingError, EmbeddingProvider};

/// Wraps a provider with a per-call deadline and a circuit breaker.
///
/// A timeout counts as a failure. While the circuit is open the provider is
/// not called at all and [`EmbeddingError::CircuitOpen`] is returned at once.
pub struct GuardedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl GuardedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration, breaker: CircuitBreaker) -> Self {
        Self {
            provider,
            timeout,
            breaker,
        }
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub async fn warm_up(&self) -> Result<(), EmbeddingError> {
        match tokio::time::timeout(self.timeout, self.provider.warm_up()).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout {
                timeout_ms: self.timeout_ms(),
            }),
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if !self.breaker.allow() {
            debug!(target: "embedding_provider", "circuit open; skipping embedding call");
            return Err(EmbeddingError::CircuitOpen);
        }

        let mut trial = TrialGuard::new(&self.breaker);
        let outcome = match tokio::time::timeout(self.timeout, self.provider.embed(text)).await {
            Ok(Ok(vector)) if vector.is_empty() => {
                Err(EmbeddingError::Provider("empty embedding vector".into()))
            }
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout {
                timeout_ms: self.timeout_ms(),
            }),
        };

        trial.disarm();

        match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(err) => {
                warn!(
                    target: "embedding_provider",
                    model = self.provider.model_id(),
                    error = %err,
                    "embedding call failed"
                );
                self.breaker.record_failure();
            }
        }
        outcome
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

/// Releases a half-open trial call if the `embed` future is dropped mid-call.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(target: "embedding_provider", "embedding call dropped before completion");
            self.breaker.abandon_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct Failing {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for Failing {
        fn model_id(&self) -> &str {
            "failing"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::Unavailable("runtime not loaded".into()))
        }
    }

    struct Slow;

    #[async_trait]
    impl EmbeddingProvider for Slow {
        fn model_id(&self) -> &str {
            "slow"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![1.0; 4])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let guard = GuardedEmbedder::new(
            Arc::new(Slow),
            Duration::from_millis(250),
            CircuitBreaker::new(3, Duration::from_secs(30)),
        );
        let err = guard.embed("age 70").await.unwrap_err();
        assert_eq!(err, EmbeddingError::Timeout { timeout_ms: 250 });
    }

    #[tokio::test]
    async fn open_circuit_skips_provider() {
        let provider = Arc::new(Failing {
            calls: AtomicUsize::new(0),
        });
        let guard = GuardedEmbedder::new(
            provider.clone(),
            Duration::from_secs(1),
            CircuitBreaker::new(2, Duration::from_secs(300)),
        );

        assert!(guard.embed("a").await.is_err());
        assert!(guard.embed("b").await.is_err());
        assert_eq!(guard.breaker_state(), BreakerState::Open);

        let err = guard.embed("c").await.unwrap_err();
        assert_eq!(err, EmbeddingError::CircuitOpen);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn success_passes_vector_through() {
        let guard = GuardedEmbedder::new(
            Arc::new(crate::HashingEmbedder::new(32)),
            Duration::from_secs(1),
            CircuitBreaker::new(2, Duration::from_secs(1)),
        );
        let v = guard.embed("pneumonia").await.unwrap();
        assert_eq!(v.len(), 32);
        assert_eq!(guard.breaker_state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_half_open_call_does_not_wedge_the_breaker() {
        let guard = GuardedEmbedder::new(
            Arc::new(Slow),
            Duration::from_secs(120),
            CircuitBreaker::new(1, Duration::from_secs(10)),
        );
        guard.breaker.record_failure();
        assert_eq!(guard.breaker_state(), BreakerState::Open);

        tokio::time::advance(Duration::from_secs(11)).await;
        let dropped = tokio::time::timeout(Duration::from_millis(10), guard.embed("slow")).await;
        assert!(dropped.is_err(), "caller gave up on the trial call");
        assert_eq!(guard.breaker_state(), BreakerState::Open);

        let next = tokio::time::timeout(Duration::from_millis(10), guard.embed("slow")).await;
        assert!(next.is_err(), "provider reached again instead of CircuitOpen");
        assert_eq!(guard.breaker_state(), BreakerState::Open);
    }
}
