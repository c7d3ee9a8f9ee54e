//! Conflict detection for candidate recommendation lists.
//!
//! A [`Validator`] runs every registered [`ConflictRule`] and reports every
//! conflict found, not only the first.

pub mod rules;

use careadvisor_core_types::{PatientContext, ValidationResult};
use tracing::debug;

pub use rules::{
    ContradictionPair, ContradictoryPairRule, Contraindication, DiagnosisContraindicationRule,
    MedicationInteractionRule,
};

/// One pluggable check over a candidate list.
pub trait ConflictRule: Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable description of every conflict this rule finds.
    fn check(&self, recommendations: &[String], context: &PatientContext) -> Vec<String>;
}

#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ConflictRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_rules() -> Self {
        Self::new()
            .with_rule(ContradictoryPairRule::default())
            .with_rule(MedicationInteractionRule::default())
            .with_rule(DiagnosisContraindicationRule::default())
    }

    pub fn with_rule(mut self, rule: impl ConflictRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn validate(&self, recommendations: &[String], context: &PatientContext) -> ValidationResult {
        let mut conflicts = Vec::new();
        for rule in &self.rules {
            let found = rule.check(recommendations, context);
            if !found.is_empty() {
                debug!(rule = rule.name(), count = found.len(), "validator rule reported conflicts");
            }
            conflicts.extend(found);
        }
        ValidationResult::from_conflicts(conflicts)
    }
}

/// Case-insensitive match of any keyword inside `text`.
pub(crate) fn mentions_any(text: &str, keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|kw| lowered.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{Medication, RiskLevel};

    fn recs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn clean_list_is_valid() {
        let validator = Validator::with_default_rules();
        let ctx = PatientContext::new(70, RiskLevel::High).with_diagnoses(["pneumonia"]);
        let result = validator.validate(
            &recs(&[
                "Administer antibiotics per protocol",
                "Assess fall risk",
                "Continuous vital signs monitoring",
            ]),
            &ctx,
        );
        assert!(result.is_valid);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn every_conflict_is_enumerated() {
        let validator = Validator::with_default_rules();
        let ctx = PatientContext::new(60, RiskLevel::Medium)
            .with_diagnoses(["asthma"])
            .with_medications(vec![Medication::named("Warfarin")]);
        let result = validator.validate(
            &recs(&[
                "Start anticoagulation",
                "Hold anticoagulation before procedure",
                "Give ibuprofen for pain",
                "Start propranolol",
            ]),
            &ctx,
        );
        assert!(!result.is_valid);
        assert_eq!(result.conflicts.len(), 3, "{:?}", result.conflicts);
    }

    #[test]
    fn custom_rules_plug_in() {
        struct NoShouting;
        impl ConflictRule for NoShouting {
            fn name(&self) -> &str {
                "no_shouting"
            }
            fn check(&self, recommendations: &[String], _: &PatientContext) -> Vec<String> {
                recommendations
                    .iter()
                    .filter(|r| r.chars().all(|c| !c.is_lowercase()))
                    .map(|r| format!("shouting: {r}"))
                    .collect()
            }
        }

        let validator = Validator::new().with_rule(NoShouting);
        let ctx = PatientContext::new(30, RiskLevel::Low);
        assert!(!validator.validate(&recs(&["REST"]), &ctx).is_valid);
        assert!(validator.validate(&recs(&["Rest"]), &ctx).is_valid);
        assert_eq!(validator.rule_names(), vec!["no_shouting"]);
    }
}
