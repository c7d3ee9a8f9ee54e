use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Strength of clinical evidence behind a knowledge-base recommendation.
///
/// Ordering follows strength: `A` sorts before `B` before `C`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceLevel {
    A,
    B,
    C,
}

impl EvidenceLevel {
    /// Score contribution used when ranking candidates.
    pub fn weight(self) -> f64 {
        match self {
            EvidenceLevel::A => 3.0,
            EvidenceLevel::B => 2.0,
            EvidenceLevel::C => 1.0,
        }
    }
}

impl fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EvidenceLevel::A => "A",
            EvidenceLevel::B => "B",
            EvidenceLevel::C => "C",
        };
        f.write_str(label)
    }
}

impl FromStr for EvidenceLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(EvidenceLevel::A),
            "B" | "b" => Ok(EvidenceLevel::B),
            "C" | "c" => Ok(EvidenceLevel::C),
            other => Err(CoreError::UnknownEvidenceLevel(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub diagnosis: String,
    pub evidence_level: EvidenceLevel,
    pub recommendations: Vec<String>,
}

impl KnowledgeEntry {
    pub fn new<I, S>(diagnosis: impl Into<String>, evidence_level: EvidenceLevel, recs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            diagnosis: diagnosis.into(),
            evidence_level,
            recommendations: recs.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact text match, ignoring surrounding whitespace on either side.
    pub fn backs(&self, recommendation: &str) -> bool {
        let wanted = recommendation.trim();
        self.recommendations.iter().any(|r| r.trim() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stronger_evidence_sorts_first() {
        let mut levels = vec![EvidenceLevel::C, EvidenceLevel::A, EvidenceLevel::B];
        levels.sort();
        assert_eq!(levels, vec![EvidenceLevel::A, EvidenceLevel::B, EvidenceLevel::C]);
        assert!(EvidenceLevel::A.weight() > EvidenceLevel::C.weight());
    }

    #[test]
    fn backing_ignores_padding_in_loaded_text() {
        let entry = KnowledgeEntry::new("pneumonia", EvidenceLevel::B, ["  Encourage incentive spirometry\n"]);
        assert!(entry.backs("Encourage incentive spirometry"));
        assert!(!entry.backs("Encourage spirometry"));
    }
}
