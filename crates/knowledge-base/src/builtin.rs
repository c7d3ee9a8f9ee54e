use careadvisor_core_types::{EvidenceLevel, KnowledgeEntry};

/// Seed entries used when no knowledge file is configured.
pub fn builtin_entries() -> Vec<KnowledgeEntry> {
    use EvidenceLevel::*;
    vec![
        KnowledgeEntry::new(
            "pneumonia",
            A,
            [
                "Administer antibiotics per protocol",
                "Monitor oxygen saturation",
            ],
        ),
        KnowledgeEntry::new("pneumonia", B, ["Encourage incentive spirometry"]),
        KnowledgeEntry::new(
            "sepsis",
            A,
            [
                "Obtain blood cultures before antibiotics",
                "Measure serum lactate",
            ],
        ),
        KnowledgeEntry::new(
            "heart failure",
            A,
            ["Record daily weight", "Monitor fluid balance"],
        ),
        KnowledgeEntry::new("heart failure", B, ["Restrict sodium intake"]),
        KnowledgeEntry::new(
            "diabetes",
            A,
            ["Monitor capillary blood glucose", "Review glycemic targets"],
        ),
        KnowledgeEntry::new("diabetes", C, ["Provide foot care education"]),
        KnowledgeEntry::new(
            "hypertension",
            A,
            ["Monitor blood pressure twice daily"],
        ),
        KnowledgeEntry::new("copd", B, ["Review inhaler technique"]),
        KnowledgeEntry::new("atrial fibrillation", A, ["Assess stroke risk score"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryKnowledgeBase, KnowledgeBase};

    #[test]
    fn builtin_base_covers_common_diagnoses() {
        let kb = InMemoryKnowledgeBase::new(builtin_entries());
        for dx in ["pneumonia", "sepsis", "heart failure", "diabetes"] {
            assert!(!kb.at_level(dx, EvidenceLevel::A).is_empty(), "{dx} has grade A entries");
        }
    }
}
