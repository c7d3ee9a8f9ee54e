use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub conflicts: Vec<String>,
}

impl ValidationResult {
    pub fn from_conflicts(conflicts: Vec<String>) -> Self {
        Self {
            is_valid: conflicts.is_empty(),
            conflicts,
        }
    }

    pub fn valid() -> Self {
        Self::from_conflicts(Vec::new())
    }
}
