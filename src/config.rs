//! Layered configuration.
//!
//! Built-in defaults are overlaid by an optional YAML file and then by
//! `CARE_ADVISOR__SECTION__KEY=value` environment variables. The merged value
//! is validated before it is handed to the service.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use careadvisor_similarity::{SimilarityEngine, SimilarityWeights};
use embedding_provider::CircuitBreaker;
use recommendation_cache::CachePolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{AdvisorError, Result};

pub const ENV_PREFIX: &str = "CARE_ADVISOR__";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub cache: CacheSection,
    pub similarity: SimilaritySection,
    pub embedding: EmbeddingSection,
    pub feedback: FeedbackSection,
    pub knowledge: KnowledgeSection,
    pub rules: RulesSection,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilaritySection {
    pub threshold: f64,
    pub diagnosis_weight: f64,
    pub age_weight: f64,
    pub medication_weight: f64,
}

impl Default for SimilaritySection {
    fn default() -> Self {
        let weights = SimilarityWeights::default();
        Self {
            threshold: careadvisor_similarity::DEFAULT_THRESHOLD,
            diagnosis_weight: weights.diagnosis,
            age_weight: weights.age,
            medication_weight: weights.medication,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub timeout_ms: u64,
    pub dimension: usize,
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    /// Minimum cosine for a stored feedback embedding to count as a neighbour.
    pub min_cosine: f64,
    pub max_neighbours: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            dimension: embedding_provider::hashing::DEFAULT_DIMENSION,
            failure_threshold: 3,
            cooldown_ms: 30_000,
            min_cosine: 0.8,
            max_neighbours: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSection {
    pub capacity: usize,
    pub persist_path: Option<PathBuf>,
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            capacity: feedback_store::DEFAULT_CAPACITY,
            persist_path: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSection {
    /// JSON or YAML knowledge file. The builtin entries are used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesSection {
    pub elderly_age: u32,
    pub fever_celsius: f64,
}

impl Default for RulesSection {
    fn default() -> Self {
        Self {
            elderly_age: 65,
            fever_celsius: 37.8,
        }
    }
}

impl AdvisorConfig {
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.cache.capacity == 0 {
            problems.push("cache.capacity must be greater than zero".to_string());
        }
        if self.cache.ttl_secs == 0 {
            problems.push("cache.ttl_secs must be greater than zero".to_string());
        }
        let s = &self.similarity;
        if !(0.0..=1.0).contains(&s.threshold) {
            problems.push(format!("similarity.threshold {} outside [0, 1]", s.threshold));
        }
        if [s.diagnosis_weight, s.age_weight, s.medication_weight]
            .iter()
            .any(|w| *w < 0.0 || !w.is_finite())
        {
            problems.push("similarity weights must be finite and non-negative".to_string());
        } else if s.diagnosis_weight + s.age_weight + s.medication_weight <= 0.0 {
            problems.push("similarity weights must sum to more than zero".to_string());
        }
        let e = &self.embedding;
        if e.timeout_ms == 0 {
            problems.push("embedding.timeout_ms must be greater than zero".to_string());
        }
        if e.dimension == 0 {
            problems.push("embedding.dimension must be greater than zero".to_string());
        }
        if e.failure_threshold == 0 {
            problems.push("embedding.failure_threshold must be greater than zero".to_string());
        }
        if !(-1.0..=1.0).contains(&e.min_cosine) {
            problems.push(format!("embedding.min_cosine {} outside [-1, 1]", e.min_cosine));
        }
        if self.feedback.capacity == 0 {
            problems.push("feedback.capacity must be greater than zero".to_string());
        }
        if !self.rules.fever_celsius.is_finite() {
            problems.push("rules.fever_celsius must be finite".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AdvisorError::Config(problems.join("; ")))
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::default()
            .with_capacity(self.cache.capacity)
            .with_ttl(Duration::from_secs(self.cache.ttl_secs))
    }

    pub fn similarity_engine(&self) -> SimilarityEngine {
        SimilarityEngine::new(
            SimilarityWeights {
                diagnosis: self.similarity.diagnosis_weight,
                age: self.similarity.age_weight,
                medication: self.similarity.medication_weight,
            },
            self.similarity.threshold,
        )
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_millis(self.embedding.timeout_ms)
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(
            self.embedding.failure_threshold,
            Duration::from_millis(self.embedding.cooldown_ms),
        )
    }
}

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
}

impl LoadOptions {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
            include_env: true,
        }
    }
}

/// Defaults, then `path` if it exists, then the environment.
pub fn load_config(path: Option<&Path>) -> Result<AdvisorConfig> {
    let mut options = LoadOptions {
        include_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_config_with_options(&options)
}

pub fn load_config_with_options(options: &LoadOptions) -> Result<AdvisorConfig> {
    let mut merged = serde_json::to_value(AdvisorConfig::default())
        .map_err(|err| AdvisorError::Config(err.to_string()))?;

    for path in &options.paths {
        if path.exists() {
            apply_overlays(&mut merged, overlays_from_file(path)?)?;
        }
    }
    if options.include_env {
        apply_overlays(&mut merged, overlays_from_env())?;
    }

    let config: AdvisorConfig =
        serde_json::from_value(merged).map_err(|err| AdvisorError::Config(err.to_string()))?;
    config.validate()?;
    Ok(config)
}

struct Overlay {
    path: String,
    value: Value,
}

fn apply_overlays(target: &mut Value, overlays: Vec<Overlay>) -> Result<()> {
    for overlay in overlays {
        debug!(target: "care_advisor::config", path = %overlay.path, "applying config overlay");
        let segments: Vec<&str> = overlay.path.split('.').collect();
        set_json_value(target, &segments, overlay.value)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<Overlay>> {
    let content = fs::read_to_string(path)
        .map_err(|err| AdvisorError::Config(format!("reading {}: {err}", path.display())))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|err| AdvisorError::Config(format!("parsing {}: {err}", path.display())))?;
    let json = serde_json::to_value(yaml)
        .map_err(|err| AdvisorError::Config(format!("parsing {}: {err}", path.display())))?;
    Ok(flatten_value(json, None))
}

fn overlays_from_env() -> Vec<Overlay> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            continue;
        }
        overlays.push(Overlay {
            path,
            value: parse_env_value(&raw),
        });
    }
    // env::vars order is unspecified
    overlays.sort_by(|a, b| a.path.cmp(&b.path));
    overlays
}

pub(crate) fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    if let Ok(int_val) = raw.parse::<i64>() {
        return Value::Number(int_val.into());
    }
    Value::String(raw.to_string())
}

fn flatten_value(value: Value, prefix: Option<String>) -> Vec<Overlay> {
    match value {
        Value::Object(map) => {
            let mut result = Vec::new();
            for (key, value) in map {
                let key_segment = key.trim().to_ascii_lowercase();
                let next_prefix = match &prefix {
                    Some(prefix) if !prefix.is_empty() => format!("{prefix}.{key_segment}"),
                    _ => key_segment,
                };
                result.extend(flatten_value(value, Some(next_prefix)));
            }
            result
        }
        other => match prefix {
            Some(path) => vec![Overlay { path, value: other }],
            None => Vec::new(),
        },
    }
}

pub(crate) fn set_json_value(target: &mut Value, segments: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = segments.split_last() else {
        return Err(AdvisorError::Config("empty configuration key".into()));
    };
    let mut cursor = target;
    for segment in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(Map::new());
        }
        let Some(map) = cursor.as_object_mut() else {
            return Err(AdvisorError::Config(format!("{segment} is not a section")));
        };
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    match cursor.as_object_mut() {
        Some(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        None => Err(AdvisorError::Config(format!(
            "cannot set {} on a non-section value",
            segments.join(".")
        ))),
    }
}
