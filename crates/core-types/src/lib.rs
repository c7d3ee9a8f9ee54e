//! Shared clinical data model for the recommendation engine crates.

pub mod context;
pub mod feedback;
pub mod knowledge;
pub mod record;
pub mod validation;

use thiserror::Error;

pub use context::{normalize_term, Medication, PatientContext, RiskLevel, VitalSigns};
pub use feedback::FeedbackRecord;
pub use knowledge::{EvidenceLevel, KnowledgeEntry};
pub use record::{AiAnalysis, MedicationOrder, PatientRecord, PersonalInfo, TreatmentData};
pub use validation::ValidationResult;

/// Error raised when parsing the string forms of the model enums.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown risk level: {0}")]
    UnknownRiskLevel(String),
    #[error("unknown evidence level: {0}")]
    UnknownEvidenceLevel(String),
}
