use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Consecutive-failure circuit breaker.
///
/// Opens after `failure_threshold` failures in a row and rejects calls until
/// `cooldown` has passed, then lets one trial call through (half-open). A
/// successful trial closes it again; a failed one re-opens it. A trial that
/// never reports back is given up after another `cooldown`.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_started: None,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Whether a call may proceed right now.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                let stale = inner
                    .trial_started
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if stale {
                    warn!(target: "embedding_provider", "half-open trial call never reported; retrying");
                    inner.trial_started = Some(Instant::now());
                }
                stale
            }
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_started = Some(Instant::now());
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Hands back a half-open trial whose call was dropped before finishing.
    ///
    /// The breaker returns to `Open` with its original `opened_at`, so the
    /// next `allow` after the cooldown starts a fresh trial. No failure is
    /// counted. Calls made while closed are unaffected.
    pub fn abandon_trial(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.trial_started = None;
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Closed {
            info!(target: "embedding_provider", "embedding circuit closed");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        let trip = inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= self.failure_threshold;
        if trip && inner.state != BreakerState::Open {
            warn!(
                target: "embedding_provider",
                failures = inner.consecutive_failures,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "embedding circuit opened"
            );
        }
        if trip {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_started = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_recovers_after_cooldown() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        assert!(breaker.allow());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.allow(), "trial call allowed after cooldown");
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(!breaker.allow(), "only one trial call while half-open");

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(5));
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(breaker.allow());
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_is_retried() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(breaker.allow());
        breaker.abandon_trial();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(breaker.allow(), "cooldown already served");
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_trial_expires_after_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        breaker.record_failure();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(breaker.allow());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!breaker.allow(), "trial call still in flight");
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(breaker.allow(), "stale trial call replaced");
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
