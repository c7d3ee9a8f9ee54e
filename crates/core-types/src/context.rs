use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Coarse patient risk classification supplied by the upstream analysis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, RiskLevel::High)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "baixo" => Ok(RiskLevel::Low),
            "medium" | "moderate" | "medio" | "médio" => Ok(RiskLevel::Medium),
            "high" | "alto" => Ok(RiskLevel::High),
            other => Err(CoreError::UnknownRiskLevel(other.to_string())),
        }
    }
}

/// Trimmed, lowercased form of a diagnosis or drug name.
///
/// Every comparison of clinical terms goes through this, so input casing
/// never decides whether two patients look alike. Blank terms yield `None`.
pub fn normalize_term(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// A single set of vital-sign observations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    /// Body temperature in degrees Celsius.
    pub temperature: f64,
    /// Blood pressure as "systolic/diastolic".
    #[serde(default)]
    pub blood_pressure: String,
    #[serde(default)]
    pub heart_rate: f64,
    #[serde(default)]
    pub oxygen_saturation: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
}

impl Medication {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: String::new(),
            frequency: String::new(),
        }
    }
}

/// Clinical context for a single analysis pass.
///
/// Built fresh for every request and never mutated afterwards. Diagnoses are
/// held in an ordered set so two contexts that differ only in input ordering
/// compare and fingerprint identically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientContext {
    pub age: u32,
    pub diagnoses: BTreeSet<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub vitals: Option<VitalSigns>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub procedures: Vec<String>,
}

impl PatientContext {
    pub fn new(age: u32, risk_level: RiskLevel) -> Self {
        Self {
            age,
            diagnoses: BTreeSet::new(),
            risk_level,
            vitals: None,
            medications: Vec::new(),
            procedures: Vec::new(),
        }
    }

    pub fn with_diagnoses<I, S>(mut self, diagnoses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.diagnoses = diagnoses.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_medications(mut self, medications: Vec<Medication>) -> Self {
        self.medications = medications;
        self
    }

    pub fn with_vitals(mut self, vitals: VitalSigns) -> Self {
        self.vitals = Some(vitals);
        self
    }

    pub fn with_procedures(mut self, procedures: Vec<String>) -> Self {
        self.procedures = procedures;
        self
    }

    pub fn medication_names(&self) -> impl Iterator<Item = &str> {
        self.medications.iter().map(|m| m.name.as_str())
    }

    pub fn diagnosis_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.diagnoses.iter().filter_map(|d| normalize_term(d))
    }

    /// Normalised drug names for similarity; display names are left as given.
    pub fn medication_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.medications.iter().filter_map(|m| normalize_term(&m.name))
    }

    pub fn temperature(&self) -> Option<f64> {
        self.vitals.as_ref().map(|v| v.temperature)
    }

    /// Age rounded down to its decade, used to coarsen cache keys.
    pub fn age_bucket(&self) -> u32 {
        (self.age / 10) * 10
    }
}
