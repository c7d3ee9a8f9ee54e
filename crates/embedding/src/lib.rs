//! Context embedding behind an injectable capability.
//!
//! The orchestrator never talks to an inference runtime directly: it holds an
//! [`EmbeddingProvider`] wrapped in a [`GuardedEmbedder`], which bounds every
//! call with a timeout and stops calling a failing provider for a while.

pub mod breaker;
pub mod describe;
pub mod guard;
pub mod hashing;
pub mod provider;

pub use breaker::{BreakerState, CircuitBreaker};
pub use describe::{describe_context, describe_feedback};
pub use guard::GuardedEmbedder;
pub use hashing::HashingEmbedder;
pub use provider::{EmbeddingError, EmbeddingProvider};
