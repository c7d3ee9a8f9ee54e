//! Scoring and prioritisation of candidate recommendations.
//!
//! Every candidate starts at 1. Evidence adds the weight of the best grade
//! backing the exact text (A=3, B=2, C=1), effective feedback adds 0.5 per
//! record mentioning it, and monitoring items gain 2 for high-risk patients.
//! Ordering is a stable descending sort, so ties keep aggregation order.

use careadvisor_core_types::{KnowledgeEntry, PatientContext};
use feedback_store::FeedbackStore;
use knowledge_base::KnowledgeBase;
use serde::Serialize;

const BASE_SCORE: f64 = 1.0;
const FEEDBACK_WEIGHT: f64 = 0.5;
const HIGH_RISK_MONITORING_BONUS: f64 = 2.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedRecommendation {
    pub text: String,
    pub score: f64,
}

pub struct Scorer<'a> {
    evidence: Vec<KnowledgeEntry>,
    feedback: &'a FeedbackStore,
}

impl<'a> Scorer<'a> {
    pub fn new(
        context: &PatientContext,
        knowledge: &dyn KnowledgeBase,
        feedback: &'a FeedbackStore,
    ) -> Self {
        let evidence = context
            .diagnoses
            .iter()
            .flat_map(|diagnosis| knowledge.recommendations_for(diagnosis))
            .collect();
        Self { evidence, feedback }
    }

    pub fn score(&self, text: &str, context: &PatientContext) -> f64 {
        let evidence = self
            .evidence
            .iter()
            .filter(|entry| entry.backs(text))
            .map(|entry| entry.evidence_level.weight())
            .fold(0.0, f64::max);
        let feedback = self.feedback.positive_mentions(text) as f64 * FEEDBACK_WEIGHT;
        let monitoring = if context.risk_level.is_high() && text.to_lowercase().contains("monitor") {
            HIGH_RISK_MONITORING_BONUS
        } else {
            0.0
        };
        BASE_SCORE + evidence + feedback + monitoring
    }

    pub fn rank(&self, candidates: Vec<String>, context: &PatientContext) -> Vec<RankedRecommendation> {
        let mut ranked: Vec<RankedRecommendation> = candidates
            .into_iter()
            .map(|text| {
                let score = self.score(&text, context);
                RankedRecommendation { text, score }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{EvidenceLevel, FeedbackRecord, RiskLevel};
    use knowledge_base::InMemoryKnowledgeBase;

    fn kb() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::new(vec![
            KnowledgeEntry::new("pneumonia", EvidenceLevel::A, ["Administer antibiotics per protocol"]),
            KnowledgeEntry::new("pneumonia", EvidenceLevel::C, ["Administer antibiotics per protocol"]),
            KnowledgeEntry::new("pneumonia", EvidenceLevel::B, ["Encourage incentive spirometry"]),
        ])
    }

    #[test]
    fn best_grade_wins_and_monitoring_bonus_needs_high_risk() {
        let store = FeedbackStore::new(10);
        let kb = kb();
        let high = PatientContext::new(70, RiskLevel::High).with_diagnoses(["pneumonia"]);
        let scorer = Scorer::new(&high, &kb, &store);
        assert_eq!(scorer.score("Administer antibiotics per protocol", &high), 4.0);
        assert_eq!(scorer.score("Encourage incentive spirometry", &high), 3.0);
        assert_eq!(scorer.score("Continuous vital signs MONITORING", &high), 3.0);

        let medium = PatientContext::new(70, RiskLevel::Medium).with_diagnoses(["pneumonia"]);
        let scorer = Scorer::new(&medium, &kb, &store);
        assert_eq!(scorer.score("Continuous vital signs monitoring", &medium), 1.0);
    }

    #[test]
    fn padded_knowledge_text_keeps_its_grade() {
        let store = FeedbackStore::new(10);
        let kb = InMemoryKnowledgeBase::new(vec![KnowledgeEntry::new(
            "copd",
            EvidenceLevel::A,
            [" Review inhaler technique "],
        )]);
        let ctx = PatientContext::new(60, RiskLevel::Medium).with_diagnoses(["copd"]);
        let scorer = Scorer::new(&ctx, &kb, &store);
        assert_eq!(scorer.score("Review inhaler technique", &ctx), 4.0);
    }

    #[test]
    fn positive_feedback_adds_half_point_each() {
        let store = FeedbackStore::new(10);
        for effective in [true, true, false] {
            store.record(FeedbackRecord::new(
                70,
                RiskLevel::Medium,
                effective,
                "assess fall risk worked well",
            ));
        }
        let kb = kb();
        let ctx = PatientContext::new(70, RiskLevel::Medium);
        let scorer = Scorer::new(&ctx, &kb, &store);
        assert_eq!(scorer.score("Assess fall risk", &ctx), 2.0);
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let store = FeedbackStore::new(10);
        let kb = kb();
        let ctx = PatientContext::new(70, RiskLevel::Low).with_diagnoses(["pneumonia"]);
        let scorer = Scorer::new(&ctx, &kb, &store);
        let ranked = scorer.rank(
            vec![
                "b".to_string(),
                "a".to_string(),
                "Administer antibiotics per protocol".to_string(),
                "c".to_string(),
            ],
            &ctx,
        );
        let texts: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Administer antibiotics per protocol", "b", "a", "c"]);
    }
}
