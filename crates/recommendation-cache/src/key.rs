use std::fmt;

use careadvisor_core_types::{PatientContext, RiskLevel};
use serde::Serialize;

use crate::errors::CacheError;

/// Coarse cache key derived from a patient context.
///
/// Two contexts that differ only in diagnosis ordering, or in exact age within
/// the same decade, share a fingerprint. A matching fingerprint is a bucket,
/// not proof of equivalence: callers re-check similarity on every hit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    raw: String,
}

#[derive(Serialize)]
struct FingerprintParts<'a> {
    diagnoses: Vec<&'a str>,
    age_bucket: u32,
    risk_level: RiskLevel,
}

impl Fingerprint {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Canonical JSON of sorted diagnoses, age decade and risk level.
    pub fn of(context: &PatientContext) -> Result<Self, CacheError> {
        let mut diagnoses: Vec<&str> = context.diagnoses.iter().map(String::as_str).collect();
        diagnoses.sort_unstable();
        diagnoses.dedup();
        let parts = FingerprintParts {
            diagnoses,
            age_bucket: context.age_bucket(),
            risk_level: context.risk_level,
        };
        Ok(Self {
            raw: serde_json::to_string(&parts)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
