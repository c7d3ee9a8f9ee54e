//! Context extraction from a raw patient record.

use careadvisor_core_types::{normalize_term, PatientContext, PatientRecord, RiskLevel, VitalSigns};

use crate::errors::{AdvisorError, Result};

const MAX_PLAUSIBLE_AGE: u32 = 130;
const CRITICAL_SPO2: f64 = 90.0;
const CRITICAL_TEMPERATURE: f64 = 39.0;

/// Builds the immutable context for one analysis pass.
///
/// Uses the latest vitals and the active medications only. When the record
/// carries no risk level, one is derived from the latest vitals.
pub fn extract_context(record: &PatientRecord) -> Result<PatientContext> {
    let age = record
        .personal_info
        .age
        .ok_or_else(|| AdvisorError::InvalidRecord("personalInfo.age is missing".into()))?;
    if age > MAX_PLAUSIBLE_AGE {
        return Err(AdvisorError::InvalidRecord(format!("implausible age {age}")));
    }

    let vitals = record.latest_vitals().cloned();
    let risk_level = record
        .supplied_risk_level()
        .unwrap_or_else(|| derive_risk_level(vitals.as_ref()));

    let diagnoses = record
        .treatment
        .diagnoses
        .iter()
        .filter_map(|d| normalize_term(d));

    let medications = record
        .treatment
        .medications
        .iter()
        .filter(|order| order.active && !order.name.trim().is_empty())
        .map(|order| order.to_medication())
        .collect();

    let procedures = record
        .treatment
        .procedures
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let mut context = PatientContext::new(age, risk_level)
        .with_diagnoses(diagnoses)
        .with_medications(medications)
        .with_procedures(procedures);
    context.vitals = vitals;
    Ok(context)
}

fn derive_risk_level(vitals: Option<&VitalSigns>) -> RiskLevel {
    match vitals {
        Some(v)
            if (v.oxygen_saturation > 0.0 && v.oxygen_saturation < CRITICAL_SPO2)
                || v.temperature >= CRITICAL_TEMPERATURE =>
        {
            RiskLevel::High
        }
        _ => RiskLevel::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{AiAnalysis, MedicationOrder, PersonalInfo, TreatmentData};
    use chrono::{TimeZone, Utc};

    fn vitals(temperature: f64, spo2: f64, hour: u32) -> VitalSigns {
        VitalSigns {
            temperature,
            blood_pressure: "120/80".into(),
            heart_rate: 80.0,
            oxygen_saturation: spo2,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    fn record(age: Option<u32>) -> PatientRecord {
        PatientRecord {
            personal_info: PersonalInfo { name: None, age },
            treatment: TreatmentData {
                diagnoses: vec![" Pneumonia ".into(), "".into()],
                vitals: vec![vitals(38.2, 95.0, 12), vitals(37.0, 97.0, 8)],
                medications: vec![
                    MedicationOrder {
                        name: "Ceftriaxone".into(),
                        dosage: "1g".into(),
                        frequency: "q24h".into(),
                        active: true,
                    },
                    MedicationOrder {
                        name: "Heparin".into(),
                        dosage: String::new(),
                        frequency: String::new(),
                        active: false,
                    },
                ],
                procedures: vec![],
            },
            ..PatientRecord::default()
        }
    }

    #[test]
    fn normalises_diagnoses_and_keeps_active_medications() {
        let ctx = extract_context(&record(Some(70))).unwrap();
        assert_eq!(ctx.diagnoses.iter().collect::<Vec<_>>(), vec!["pneumonia"]);
        assert_eq!(ctx.medication_names().collect::<Vec<_>>(), vec!["Ceftriaxone"]);
        assert_eq!(ctx.temperature(), Some(38.2));
    }

    #[test]
    fn supplied_risk_wins_over_derived() {
        let mut rec = record(Some(70));
        rec.ai_analysis = Some(AiAnalysis {
            risk_level: Some(RiskLevel::Low),
        });
        assert_eq!(extract_context(&rec).unwrap().risk_level, RiskLevel::Low);
    }

    #[test]
    fn risk_derived_from_latest_vitals() {
        let mut rec = record(Some(70));
        assert_eq!(extract_context(&rec).unwrap().risk_level, RiskLevel::Medium);
        rec.treatment.vitals.push(vitals(37.2, 88.0, 18));
        assert_eq!(extract_context(&rec).unwrap().risk_level, RiskLevel::High);
        rec.treatment.vitals.clear();
        assert_eq!(extract_context(&rec).unwrap().risk_level, RiskLevel::Medium);
    }

    #[test]
    fn missing_age_is_invalid() {
        let err = extract_context(&record(None)).unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidRecord(_)));
    }
}
