use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{normalize_term, Medication, PatientContext, RiskLevel, VitalSigns};

/// Outcome of a past recommendation, submitted by clinicians after the fact.
///
/// Records are append-only. A correction is a new record, never an edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub age: u32,
    #[serde(alias = "diagnoses")]
    pub diagnosis: Vec<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub procedures: Vec<String>,
    pub effective: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(age: u32, risk_level: RiskLevel, effective: bool, notes: impl Into<String>) -> Self {
        Self {
            age,
            diagnosis: Vec::new(),
            risk_level,
            medications: Vec::new(),
            procedures: Vec::new(),
            effective,
            notes: notes.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_diagnoses<I, S>(mut self, diagnoses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diagnosis = diagnoses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_medications(mut self, medications: Vec<Medication>) -> Self {
        self.medications = medications;
        self
    }

    /// Projects the record into a context for similarity checks.
    ///
    /// Diagnoses are normalised the same way context extraction does it.
    /// Vitals are not retained with feedback, so the caller's current vitals
    /// stand in for them.
    pub fn as_context(&self, vitals: Option<VitalSigns>) -> PatientContext {
        PatientContext {
            age: self.age,
            diagnoses: self
                .diagnosis
                .iter()
                .filter_map(|d| normalize_term(d))
                .collect(),
            risk_level: self.risk_level,
            vitals,
            medications: self.medications.clone(),
            procedures: self.procedures.clone(),
        }
    }

    pub fn mentions(&self, text: &str) -> bool {
        let needle = text.trim().to_lowercase();
        !needle.is_empty() && self.notes.to_lowercase().contains(&needle)
    }
}
