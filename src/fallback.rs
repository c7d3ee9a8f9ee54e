use careadvisor_core_types::RiskLevel;

const BASELINE: [&str; 4] = [
    "Monitor vital signs per institutional protocol",
    "Maintain prescribed medications under supervision",
    "Observe and record clinical evolution",
    "Follow standard precautions",
];

const HIGH_RISK_EXTRAS: [&str; 3] = [
    "Intensify monitoring frequency",
    "Consider specialist evaluation",
    "Keep care team on alert",
];

/// Conservative list returned whenever the pipeline cannot produce a
/// validated answer.
pub fn fallback_recommendations(risk_level: RiskLevel) -> Vec<String> {
    let mut items: Vec<String> = BASELINE.iter().map(|s| s.to_string()).collect();
    if risk_level.is_high() {
        items.extend(HIGH_RISK_EXTRAS.iter().map(|s| s.to_string()));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_risk_extends_baseline() {
        let medium = fallback_recommendations(RiskLevel::Medium);
        let high = fallback_recommendations(RiskLevel::High);
        assert_eq!(medium.len(), 4);
        assert_eq!(high.len(), 7);
        assert_eq!(&high[..4], &medium[..]);
        assert_eq!(fallback_recommendations(RiskLevel::Low), medium);
    }
}
