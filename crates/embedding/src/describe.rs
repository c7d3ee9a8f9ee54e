use careadvisor_core_types::{FeedbackRecord, PatientContext};

/// Renders a context as the text handed to the embedding provider.
///
/// Vitals are left out so that a live context and a stored feedback record
/// (which carries no vitals) describe comparably.
pub fn describe_context(context: &PatientContext) -> String {
    let mut parts = vec![
        format!("age {}", context.age_bucket()),
        format!("risk {}", context.risk_level),
    ];
    if !context.diagnoses.is_empty() {
        let diagnoses: Vec<&str> = context.diagnoses.iter().map(String::as_str).collect();
        parts.push(format!("diagnoses {}", diagnoses.join(", ")));
    }
    let medications: Vec<&str> = context.medication_names().collect();
    if !medications.is_empty() {
        parts.push(format!("medications {}", medications.join(", ")));
    }
    if !context.procedures.is_empty() {
        parts.push(format!("procedures {}", context.procedures.join(", ")));
    }
    parts.join("; ").to_lowercase()
}

pub fn describe_feedback(record: &FeedbackRecord) -> String {
    describe_context(&record.as_context(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{Medication, RiskLevel};

    #[test]
    fn context_description_is_stable() {
        let ctx = PatientContext::new(74, RiskLevel::High)
            .with_diagnoses(["Pneumonia", "COPD"])
            .with_medications(vec![Medication::named("Ceftriaxone")]);
        assert_eq!(
            describe_context(&ctx),
            "age 70; risk high; diagnoses copd, pneumonia; medications ceftriaxone"
        );
    }

    #[test]
    fn feedback_matches_equivalent_context() {
        let record = FeedbackRecord::new(72, RiskLevel::Medium, true, "ok")
            .with_diagnoses(["diabetes"]);
        let ctx = PatientContext::new(78, RiskLevel::Medium).with_diagnoses(["diabetes"]);
        assert_eq!(describe_feedback(&record), describe_context(&ctx));
    }
}
