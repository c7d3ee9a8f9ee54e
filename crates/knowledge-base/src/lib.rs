//! Read-only, evidence-graded recommendation lookup keyed by diagnosis.
//!
//! The base is loaded once through a [`KnowledgeSource`] and then shared
//! behind an `Arc` for the lifetime of the service.

pub mod builtin;
pub mod errors;
pub mod loader;
pub mod store;

pub use builtin::builtin_entries;
pub use errors::KnowledgeError;
pub use loader::{FileSource, KnowledgeSource, StaticSource};
pub use store::{InMemoryKnowledgeBase, KnowledgeBase};
