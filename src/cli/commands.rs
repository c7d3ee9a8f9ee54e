use clap::Subcommand;

use super::config::ConfigArgs;
use super::feedback::FeedbackArgs;
use super::knowledge::KnowledgeArgs;
use super::recommend::RecommendArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Generate ranked care recommendations for a patient record
    Recommend(RecommendArgs),

    /// Submit or inspect clinician feedback on past recommendations
    Feedback(FeedbackArgs),

    /// Look up evidence-graded knowledge entries
    Knowledge(KnowledgeArgs),

    /// Inspect and validate the configuration
    Config(ConfigArgs),
}
