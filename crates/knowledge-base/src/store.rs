use std::collections::HashMap;

use careadvisor_core_types::{EvidenceLevel, KnowledgeEntry};

/// Lookup of evidence entries for a diagnosis.
pub trait KnowledgeBase: Send + Sync {
    fn recommendations_for(&self, diagnosis: &str) -> Vec<KnowledgeEntry>;

    /// Entries at the given grade only.
    fn at_level(&self, diagnosis: &str, level: EvidenceLevel) -> Vec<KnowledgeEntry> {
        self.recommendations_for(diagnosis)
            .into_iter()
            .filter(|entry| entry.evidence_level == level)
            .collect()
    }
}

/// Immutable index built once from loaded entries.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    index: HashMap<String, Vec<KnowledgeEntry>>,
    total: usize,
}

impl InMemoryKnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        let total = entries.len();
        let mut index: HashMap<String, Vec<KnowledgeEntry>> = HashMap::new();
        for entry in entries {
            index
                .entry(normalize(&entry.diagnosis))
                .or_default()
                .push(entry);
        }
        Self { index, total }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn diagnoses(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }
}

impl KnowledgeBase for InMemoryKnowledgeBase {
    fn recommendations_for(&self, diagnosis: &str) -> Vec<KnowledgeEntry> {
        self.index
            .get(&normalize(diagnosis))
            .cloned()
            .unwrap_or_default()
    }
}

fn normalize(diagnosis: &str) -> String {
    diagnosis.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::new(vec![
            KnowledgeEntry::new("Pneumonia", EvidenceLevel::A, ["administer antibiotics per protocol"]),
            KnowledgeEntry::new("pneumonia", EvidenceLevel::C, ["incentive spirometry"]),
            KnowledgeEntry::new("asthma", EvidenceLevel::B, ["review inhaler technique"]),
        ])
    }

    #[test]
    fn lookup_is_case_and_whitespace_insensitive() {
        let kb = base();
        assert_eq!(kb.recommendations_for("  PNEUMONIA ").len(), 2);
        assert!(kb.recommendations_for("sepsis").is_empty());
        assert_eq!(kb.len(), 3);
    }

    #[test]
    fn grade_filter_keeps_requested_level() {
        let kb = base();
        let a_only = kb.at_level("pneumonia", EvidenceLevel::A);
        assert_eq!(a_only.len(), 1);
        assert_eq!(a_only[0].recommendations[0], "administer antibiotics per protocol");
    }
}
