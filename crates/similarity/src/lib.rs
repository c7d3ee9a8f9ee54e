//! Context-to-context similarity.
//!
//! Everything here is pure and allocation-light so it can be called from any
//! number of concurrent requests without coordination.

use std::collections::HashSet;
use std::hash::Hash;

use careadvisor_core_types::PatientContext;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Relative weights of the composite similarity components.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub diagnosis: f64,
    pub age: f64,
    pub medication: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            diagnosis: 0.4,
            age: 0.3,
            medication: 0.3,
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.diagnosis + self.age + self.medication
    }
}

/// Per-component breakdown of a similarity score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityBreakdown {
    pub diagnosis: f64,
    pub age: f64,
    pub medication: f64,
    pub composite: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityEngine {
    weights: SimilarityWeights,
    threshold: f64,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(SimilarityWeights::default(), DEFAULT_THRESHOLD)
    }
}

impl SimilarityEngine {
    pub fn new(weights: SimilarityWeights, threshold: f64) -> Self {
        Self {
            weights,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn weights(&self) -> SimilarityWeights {
        self.weights
    }

    pub fn breakdown(&self, a: &PatientContext, b: &PatientContext) -> SimilarityBreakdown {
        let diagnosis = jaccard(a.diagnosis_keys(), b.diagnosis_keys());
        let age = age_similarity(a.age, b.age);
        let medication = jaccard(a.medication_keys(), b.medication_keys());
        let composite = diagnosis * self.weights.diagnosis
            + age * self.weights.age
            + medication * self.weights.medication;
        SimilarityBreakdown {
            diagnosis,
            age,
            medication,
            composite,
        }
    }

    /// Weighted composite similarity in `[0, 1]` for default weights.
    pub fn score(&self, a: &PatientContext, b: &PatientContext) -> f64 {
        self.breakdown(a, b).composite
    }

    pub fn similar(&self, a: &PatientContext, b: &PatientContext) -> bool {
        self.score(a, b) >= self.threshold
    }
}

/// Jaccard index `|A ∩ B| / |A ∪ B|` over two collections of hashable keys.
///
/// Duplicates are collapsed. Two empty sets are identical and score `1.0`.
pub fn jaccard<T, A, B>(a: A, b: B) -> f64
where
    T: Eq + Hash,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let left: HashSet<T> = a.into_iter().collect();
    let right: HashSet<T> = b.into_iter().collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.len() + right.len() - intersection;
    intersection as f64 / union as f64
}

/// `1 - |a - b| / 100`, clamped to `[0, 1]`.
pub fn age_similarity(a: u32, b: u32) -> f64 {
    let diff = a.abs_diff(b) as f64;
    (1.0 - diff / 100.0).clamp(0.0, 1.0)
}

/// Cosine similarity between two dense vectors.
///
/// Returns `0.0` for empty or mismatched vectors and for zero norms.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{Medication, RiskLevel};

    fn ctx(age: u32, dx: &[&str], meds: &[&str]) -> PatientContext {
        PatientContext::new(age, RiskLevel::Medium)
            .with_diagnoses(dx.iter().copied())
            .with_medications(meds.iter().map(|m| Medication::named(*m)).collect())
    }

    #[test]
    fn jaccard_of_two_empty_sets_is_one() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(jaccard(empty.iter(), empty.iter()), 1.0);
    }

    #[test]
    fn jaccard_against_one_empty_set_is_zero() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(jaccard(["a"].iter(), empty.iter()), 0.0);
    }

    #[test]
    fn jaccard_counts_overlap() {
        let score = jaccard(["a", "b", "c"], ["b", "c", "d"]);
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn age_similarity_is_clamped() {
        assert_eq!(age_similarity(0, 150), 0.0);
        assert_eq!(age_similarity(40, 40), 1.0);
        assert!((age_similarity(60, 70) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn term_casing_does_not_change_similarity() {
        let engine = SimilarityEngine::default();
        let a = ctx(70, &["Pneumonia"], &["Ceftriaxone"]);
        let b = ctx(70, &["pneumonia "], &["ceftriaxone"]);
        assert_eq!(engine.score(&a, &b), 1.0);
        assert!(engine.similar(&a, &b));
    }

    #[test]
    fn empty_diagnoses_and_medications_count_as_identical() {
        let engine = SimilarityEngine::default();
        let breakdown = engine.breakdown(&ctx(50, &[], &[]), &ctx(50, &[], &[]));
        assert_eq!(breakdown.diagnosis, 1.0);
        assert_eq!(breakdown.medication, 1.0);
        assert!((breakdown.composite - 1.0).abs() < 1e-12);
    }

    #[test]
    fn similarity_is_symmetric() {
        let engine = SimilarityEngine::default();
        let pairs = [
            (ctx(70, &["pneumonia"], &["ceftriaxone"]), ctx(64, &["pneumonia", "copd"], &[])),
            (ctx(20, &[], &["insulin"]), ctx(90, &["diabetes"], &["insulin", "metformin"])),
            (ctx(45, &["a", "b"], &["x"]), ctx(45, &["b"], &["x", "y"])),
        ];
        for (a, b) in pairs.iter() {
            assert_eq!(engine.score(a, b), engine.score(b, a));
            assert_eq!(engine.similar(a, b), engine.similar(b, a));
        }
    }

    #[test]
    fn threshold_gates_similarity() {
        let engine = SimilarityEngine::default();
        let base = ctx(70, &["pneumonia"], &["ceftriaxone"]);
        let near = ctx(72, &["pneumonia"], &["ceftriaxone"]);
        let far = ctx(72, &["pneumonia", "sepsis"], &[]);
        assert!(engine.similar(&base, &near));
        // 0.4 * 0.5 + 0.3 * 0.98 + 0.0 = 0.494
        assert!(!engine.similar(&base, &far));
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
    }
}
