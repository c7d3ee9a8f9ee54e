//! Raw patient record as delivered by the hospital backend.
//!
//! The engine only reads these records. Context extraction lives with the
//! orchestrator; this module only describes the wire shape.

use serde::{Deserialize, Serialize};

use crate::context::{Medication, RiskLevel, VitalSigns};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default, alias = "treatmentData")]
    pub treatment: TreatmentData,
    #[serde(default)]
    pub ai_analysis: Option<AiAnalysis>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentData {
    #[serde(default)]
    pub diagnoses: Vec<String>,
    #[serde(default, alias = "vitalSigns")]
    pub vitals: Vec<VitalSigns>,
    #[serde(default)]
    pub medications: Vec<MedicationOrder>,
    #[serde(default)]
    pub procedures: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationOrder {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl MedicationOrder {
    pub fn to_medication(&self) -> Medication {
        Medication {
            name: self.name.clone(),
            dosage: self.dosage.clone(),
            frequency: self.frequency.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
}

impl PatientRecord {
    pub fn supplied_risk_level(&self) -> Option<RiskLevel> {
        self.ai_analysis.as_ref().and_then(|a| a.risk_level)
    }

    /// Most recent vitals by timestamp, if any were recorded.
    pub fn latest_vitals(&self) -> Option<&VitalSigns> {
        self.treatment.vitals.iter().max_by_key(|v| v.timestamp)
    }
}
