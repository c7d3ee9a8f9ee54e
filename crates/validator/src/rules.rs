use careadvisor_core_types::PatientContext;
use serde::{Deserialize, Serialize};

use crate::{mentions_any, ConflictRule};

/// Two groups of phrasing that must not appear together in one list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContradictionPair {
    pub topic: String,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl ContradictionPair {
    pub fn new(topic: &str, left: &[&str], right: &[&str]) -> Self {
        Self {
            topic: topic.to_string(),
            left: lowered(left),
            right: lowered(right),
        }
    }
}

/// A recommendation phrase that clashes with something already present on
/// the patient (an active medication or a diagnosis).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contraindication {
    pub recommendation_terms: Vec<String>,
    pub present_terms: Vec<String>,
    pub reason: String,
}

impl Contraindication {
    pub fn new(recommendation_terms: &[&str], present_terms: &[&str], reason: &str) -> Self {
        Self {
            recommendation_terms: lowered(recommendation_terms),
            present_terms: lowered(present_terms),
            reason: reason.to_string(),
        }
    }
}

fn lowered(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

pub struct ContradictoryPairRule {
    pairs: Vec<ContradictionPair>,
}

impl ContradictoryPairRule {
    pub fn new(pairs: Vec<ContradictionPair>) -> Self {
        Self { pairs }
    }
}

impl Default for ContradictoryPairRule {
    fn default() -> Self {
        Self::new(vec![
            ContradictionPair::new(
                "anticoagulation",
                &["start anticoagul", "initiate anticoagul", "begin anticoagul"],
                &["hold anticoagul", "suspend anticoagul", "stop anticoagul", "withhold anticoagul"],
            ),
            ContradictionPair::new(
                "fluids",
                &["increase fluid", "encourage fluid", "fluid resuscitation"],
                &["restrict fluid", "fluid restriction"],
            ),
            ContradictionPair::new(
                "mobility",
                &["early ambulation", "early mobilisation", "early mobilization"],
                &["strict bed rest"],
            ),
            ContradictionPair::new(
                "feeding",
                &["start oral diet", "resume oral intake"],
                &["nil by mouth", "keep fasting"],
            ),
        ])
    }
}

impl ConflictRule for ContradictoryPairRule {
    fn name(&self) -> &str {
        "contradictory_pair"
    }

    fn check(&self, recommendations: &[String], _context: &PatientContext) -> Vec<String> {
        let mut conflicts = Vec::new();
        for pair in &self.pairs {
            for left in recommendations.iter().filter(|r| mentions_any(r, &pair.left)) {
                for right in recommendations.iter().filter(|r| mentions_any(r, &pair.right)) {
                    conflicts.push(format!(
                        "contradictory {} guidance: \"{}\" vs \"{}\"",
                        pair.topic, left, right
                    ));
                }
            }
        }
        conflicts
    }
}

pub struct MedicationInteractionRule {
    table: Vec<Contraindication>,
}

impl MedicationInteractionRule {
    pub fn new(table: Vec<Contraindication>) -> Self {
        Self { table }
    }
}

impl Default for MedicationInteractionRule {
    fn default() -> Self {
        Self::new(vec![
            Contraindication::new(
                &["nsaid", "ibuprofen", "naproxen", "ketorolac", "diclofenac"],
                &["warfarin", "apixaban", "rivaroxaban", "dabigatran", "heparin"],
                "bleeding risk with active anticoagulant",
            ),
            Contraindication::new(
                &["potassium supplement", "potassium chloride"],
                &["spironolactone", "eplerenone"],
                "hyperkalemia risk with potassium-sparing diuretic",
            ),
            Contraindication::new(
                &["tramadol"],
                &["sertraline", "fluoxetine", "paroxetine", "citalopram"],
                "serotonin syndrome risk with active SSRI",
            ),
        ])
    }
}

impl ConflictRule for MedicationInteractionRule {
    fn name(&self) -> &str {
        "medication_interaction"
    }

    fn check(&self, recommendations: &[String], context: &PatientContext) -> Vec<String> {
        let mut conflicts = Vec::new();
        for item in &self.table {
            let Some(medication) = context
                .medications
                .iter()
                .find(|m| mentions_any(&m.name, &item.present_terms))
            else {
                continue;
            };
            for rec in recommendations
                .iter()
                .filter(|r| mentions_any(r, &item.recommendation_terms))
            {
                conflicts.push(format!(
                    "\"{}\" conflicts with medication {}: {}",
                    rec, medication.name, item.reason
                ));
            }
        }
        conflicts
    }
}

pub struct DiagnosisContraindicationRule {
    table: Vec<Contraindication>,
}

impl DiagnosisContraindicationRule {
    pub fn new(table: Vec<Contraindication>) -> Self {
        Self { table }
    }
}

impl Default for DiagnosisContraindicationRule {
    fn default() -> Self {
        Self::new(vec![
            Contraindication::new(
                &["non-selective beta-blocker", "propranolol", "nadolol"],
                &["asthma"],
                "bronchospasm risk",
            ),
            Contraindication::new(
                &["aggressive fluid", "fluid bolus"],
                &["heart failure"],
                "volume overload risk",
            ),
            Contraindication::new(
                &["nsaid", "ibuprofen", "naproxen"],
                &["chronic kidney disease", "renal failure"],
                "nephrotoxicity risk",
            ),
        ])
    }
}

impl ConflictRule for DiagnosisContraindicationRule {
    fn name(&self) -> &str {
        "diagnosis_contraindication"
    }

    fn check(&self, recommendations: &[String], context: &PatientContext) -> Vec<String> {
        let mut conflicts = Vec::new();
        for item in &self.table {
            let Some(diagnosis) = context
                .diagnoses
                .iter()
                .find(|d| mentions_any(d, &item.present_terms))
            else {
                continue;
            };
            for rec in recommendations
                .iter()
                .filter(|r| mentions_any(r, &item.recommendation_terms))
            {
                conflicts.push(format!(
                    "\"{}\" is contraindicated with {}: {}",
                    rec, diagnosis, item.reason
                ));
            }
        }
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{Medication, RiskLevel};

    #[test]
    fn contradiction_needs_both_sides() {
        let rule = ContradictoryPairRule::default();
        let ctx = PatientContext::new(50, RiskLevel::Low);
        let one_side = vec!["Encourage fluid intake".to_string()];
        assert!(rule.check(&one_side, &ctx).is_empty());
        let both = vec![
            "Encourage fluid intake".to_string(),
            "Fluid restriction 1.5L/day".to_string(),
        ];
        assert_eq!(rule.check(&both, &ctx).len(), 1);
    }

    #[test]
    fn interaction_requires_active_medication() {
        let rule = MedicationInteractionRule::default();
        let recs = vec!["Potassium chloride 20 mEq".to_string()];
        let without = PatientContext::new(50, RiskLevel::Low);
        assert!(rule.check(&recs, &without).is_empty());
        let with = without.with_medications(vec![Medication::named("Spironolactone")]);
        let conflicts = rule.check(&recs, &with);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("hyperkalemia"));
    }

    #[test]
    fn diagnosis_match_is_case_insensitive() {
        let rule = DiagnosisContraindicationRule::default();
        let ctx = PatientContext::new(80, RiskLevel::High).with_diagnoses(["Heart Failure"]);
        let recs = vec!["Give fluid bolus 30 mL/kg".to_string()];
        assert_eq!(rule.check(&recs, &ctx).len(), 1);
    }
}
