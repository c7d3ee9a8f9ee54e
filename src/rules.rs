use careadvisor_core_types::PatientContext;

use crate::config::RulesSection;

pub const FALL_RISK: &str = "Assess fall risk";
pub const RENAL_REVIEW: &str = "Review renal function for dose adjustment";
pub const COGNITIVE_SCREEN: &str = "Screen cognitive status";
pub const INFECTIOUS_FOCUS: &str = "Investigate infectious focus";
pub const CONTINUOUS_MONITORING: &str = "Continuous vital signs monitoring";
pub const MDT_REVIEW: &str = "Request multidisciplinary team review";

/// Fixed business rules that add candidates from age, temperature and risk.
#[derive(Clone, Debug)]
pub struct ContextRules {
    elderly_age: u32,
    fever_celsius: f64,
}

impl ContextRules {
    pub fn new(section: &RulesSection) -> Self {
        Self {
            elderly_age: section.elderly_age,
            fever_celsius: section.fever_celsius,
        }
    }

    pub fn candidates(&self, context: &PatientContext) -> Vec<String> {
        let mut items: Vec<&str> = Vec::new();
        if context.age >= self.elderly_age {
            items.extend([FALL_RISK, RENAL_REVIEW, COGNITIVE_SCREEN]);
        }
        if context
            .temperature()
            .is_some_and(|temperature| temperature > self.fever_celsius)
        {
            items.push(INFECTIOUS_FOCUS);
        }
        if context.risk_level.is_high() {
            items.extend([CONTINUOUS_MONITORING, MDT_REVIEW]);
        }
        items.into_iter().map(str::to_string).collect()
    }
}

impl Default for ContextRules {
    fn default() -> Self {
        Self::new(&RulesSection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{RiskLevel, VitalSigns};
    use chrono::Utc;

    fn febrile(ctx: PatientContext, temperature: f64) -> PatientContext {
        ctx.with_vitals(VitalSigns {
            temperature,
            blood_pressure: String::new(),
            heart_rate: 0.0,
            oxygen_saturation: 0.0,
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn thresholds_are_inclusive_for_age_and_strict_for_fever() {
        let rules = ContextRules::default();
        let at_threshold = febrile(PatientContext::new(65, RiskLevel::Low), 37.8);
        assert_eq!(
            rules.candidates(&at_threshold),
            vec![FALL_RISK, RENAL_REVIEW, COGNITIVE_SCREEN]
        );

        let young_febrile = febrile(PatientContext::new(64, RiskLevel::Low), 37.9);
        assert_eq!(rules.candidates(&young_febrile), vec![INFECTIOUS_FOCUS]);
    }

    #[test]
    fn high_risk_adds_monitoring_and_review() {
        let rules = ContextRules::default();
        let ctx = PatientContext::new(30, RiskLevel::High);
        assert_eq!(rules.candidates(&ctx), vec![CONTINUOUS_MONITORING, MDT_REVIEW]);
    }

    #[test]
    fn no_vitals_means_no_fever_rule() {
        let rules = ContextRules::default();
        assert!(rules
            .candidates(&PatientContext::new(40, RiskLevel::Medium))
            .is_empty());
    }
}
