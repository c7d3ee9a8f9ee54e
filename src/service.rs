//! Recommendation orchestrator.
//!
//! One [`RiskAnalysisService`] owns the cache, the knowledge index, the
//! feedback history and the guarded embedding provider. It is constructed
//! explicitly and injected wherever it is needed; several instances can live
//! side by side in one process.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use careadvisor_core_types::{
    EvidenceLevel, FeedbackRecord, KnowledgeEntry, PatientContext, PatientRecord, RiskLevel,
};
use careadvisor_similarity::SimilarityEngine;
use clinical_validator::Validator;
use embedding_provider::{
    describe_context, describe_feedback, BreakerState, EmbeddingProvider, GuardedEmbedder,
    HashingEmbedder,
};
use feedback_store::{FeedbackStatsSnapshot, FeedbackStore, SharedFeedbackStore, StoredFeedback};
use knowledge_base::{FileSource, InMemoryKnowledgeBase, KnowledgeBase, KnowledgeSource, StaticSource};
use parking_lot::RwLock;
use recommendation_cache::{
    CacheEntry, EvictionEvent, Fingerprint, Flight, LruTtlCache, RecommendationCache,
    StatsSnapshot,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AdvisorConfig;
use crate::context::extract_context;
use crate::errors::{AdvisorError, Result};
use crate::fallback::fallback_recommendations;
use crate::rules::ContextRules;
use crate::scoring::{RankedRecommendation, Scorer};

const LOG_TARGET: &str = "care_advisor::service";

/// Step of the pipeline a log line or failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Lifecycle,
    Context,
    Fingerprint,
    CacheProbe,
    Aggregation,
    Inference,
    Validation,
    Scoring,
    CacheWrite,
    Feedback,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Lifecycle => "lifecycle",
            PipelineStage::Context => "context",
            PipelineStage::Fingerprint => "fingerprint",
            PipelineStage::CacheProbe => "cache_probe",
            PipelineStage::Aggregation => "aggregation",
            PipelineStage::Inference => "inference",
            PipelineStage::Validation => "validation",
            PipelineStage::Scoring => "scoring",
            PipelineStage::CacheWrite => "cache_write",
            PipelineStage::Feedback => "feedback",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Ready,
    Failed(String),
    ShutDown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Uninitialized => f.write_str("uninitialized"),
            ServiceState::Ready => f.write_str("ready"),
            ServiceState::Failed(reason) => write!(f, "failed ({reason})"),
            ServiceState::ShutDown => f.write_str("shut down"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Cache,
    Computed,
    Fallback,
}

/// Full outcome of one analysis pass. `recommendations` is what callers act on.
#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub fingerprint: Option<String>,
    pub risk_level: RiskLevel,
    pub source: RecommendationSource,
    pub recommendations: Vec<String>,
    /// Per-item scores; only present for freshly computed results.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ranked: Vec<RankedRecommendation>,
    pub inference_degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Analysis {
    fn fallback(risk_level: RiskLevel, fingerprint: Option<&Fingerprint>, failure: &AdvisorError) -> Self {
        Self {
            fingerprint: fingerprint.map(|fp| fp.as_str().to_string()),
            risk_level,
            source: RecommendationSource::Fallback,
            recommendations: fallback_recommendations(risk_level),
            ranked: Vec::new(),
            inference_degraded: false,
            failure: Some(failure.to_string()),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceStats {
    pub state: ServiceState,
    pub cache: Option<StatsSnapshot>,
    pub feedback: FeedbackStatsSnapshot,
    pub in_flight: usize,
    pub embedding_model: String,
    pub embedding_circuit: String,
}

/// Collaborators the service is built from. Each one can be swapped, which is
/// how tests substitute failing providers or fixed knowledge.
pub struct ServiceComponents {
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub cache: Arc<dyn RecommendationCache>,
    pub feedback: SharedFeedbackStore,
    pub validator: Validator,
}

impl ServiceComponents {
    /// Default collaborators as described by `config`.
    pub fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let knowledge: Arc<dyn KnowledgeSource> = match &config.knowledge.path {
            Some(path) => Arc::new(FileSource::new(path.clone())),
            None => Arc::new(StaticSource::default()),
        };
        let feedback = match &config.feedback.persist_path {
            Some(path) => FeedbackStore::with_persistence(path.clone(), config.feedback.capacity)?,
            None => FeedbackStore::new(config.feedback.capacity),
        };
        Ok(Self {
            knowledge,
            embedder: Arc::new(HashingEmbedder::new(config.embedding.dimension)),
            cache: Arc::new(LruTtlCache::new(config.cache_policy())),
            feedback: Arc::new(feedback),
            validator: Validator::with_default_rules(),
        })
    }

    pub fn with_knowledge(mut self, source: impl KnowledgeSource + 'static) -> Self {
        self.knowledge = Arc::new(source);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn RecommendationCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_feedback(mut self, feedback: SharedFeedbackStore) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }
}

struct StageFailure {
    stage: PipelineStage,
    error: AdvisorError,
}

impl StageFailure {
    fn at(stage: PipelineStage) -> impl FnOnce(AdvisorError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

struct Aggregated {
    candidates: Vec<String>,
    inference_degraded: bool,
}

pub struct RiskAnalysisService {
    config: AdvisorConfig,
    state: RwLock<ServiceState>,
    knowledge_source: Arc<dyn KnowledgeSource>,
    knowledge: RwLock<Option<Arc<dyn KnowledgeBase>>>,
    embedder: GuardedEmbedder,
    cache: Arc<dyn RecommendationCache>,
    flight: Flight,
    feedback: SharedFeedbackStore,
    validator: Validator,
    similarity: SimilarityEngine,
    rules: ContextRules,
}

impl RiskAnalysisService {
    /// Builds an uninitialized service. Call [`init`](Self::init) before use.
    pub fn new(config: AdvisorConfig, components: ServiceComponents) -> Self {
        let embedder = GuardedEmbedder::new(
            components.embedder,
            config.embedding_timeout(),
            config.circuit_breaker(),
        );
        Self {
            similarity: config.similarity_engine(),
            rules: ContextRules::new(&config.rules),
            state: RwLock::new(ServiceState::Uninitialized),
            knowledge_source: components.knowledge,
            knowledge: RwLock::new(None),
            embedder,
            cache: components.cache,
            flight: Flight::default(),
            feedback: components.feedback,
            validator: components.validator,
            config,
        }
    }

    pub fn from_config(config: AdvisorConfig) -> Result<Self> {
        let components = ServiceComponents::from_config(&config)?;
        Ok(Self::new(config, components))
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.state.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), ServiceState::Ready)
    }

    /// Loads the knowledge base and warms the embedding provider.
    ///
    /// A knowledge failure leaves the service `Failed`; a provider that will
    /// not warm up only degrades inference.
    pub async fn init(&self) -> Result<()> {
        match self.state() {
            ServiceState::Ready => return Ok(()),
            ServiceState::ShutDown => {
                return Err(AdvisorError::Initialization("service has been shut down".into()))
            }
            _ => {}
        }

        let started = Instant::now();
        let source = self.knowledge_source.describe();
        let entries = match self.knowledge_source.load().await {
            Ok(entries) => entries,
            Err(err) => {
                let reason = format!("knowledge source {source}: {err}");
                warn!(target: LOG_TARGET, stage = %PipelineStage::Lifecycle, error = %reason, "initialization failed");
                *self.state.write() = ServiceState::Failed(reason.clone());
                return Err(AdvisorError::Initialization(reason));
            }
        };
        let index = InMemoryKnowledgeBase::new(entries);
        let entry_count = index.len();
        *self.knowledge.write() = Some(Arc::new(index));

        if let Err(err) = self.embedder.warm_up().await {
            warn!(
                target: LOG_TARGET,
                stage = %PipelineStage::Inference,
                model = self.embedder.model_id(),
                error = %err,
                "embedding provider failed to warm up; inference will degrade"
            );
        }

        *self.state.write() = ServiceState::Ready;
        info!(
            target: LOG_TARGET,
            source = %source,
            entries = entry_count,
            feedback_records = self.feedback.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "risk analysis service ready"
        );
        Ok(())
    }

    /// Stops serving and flushes feedback to disk when persistence is on.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.write();
            if *state == ServiceState::ShutDown {
                return;
            }
            *state = ServiceState::ShutDown;
        }
        if let Err(err) = self.feedback.persist_now() {
            warn!(target: LOG_TARGET, stage = %PipelineStage::Lifecycle, error = %err, "feedback flush failed on shutdown");
        }
        info!(target: LOG_TARGET, "risk analysis service shut down");
    }

    /// Ranked recommendations for a patient. Never fails: any problem yields
    /// the fallback list.
    pub async fn generate_recommendations(&self, record: &PatientRecord) -> Vec<String> {
        self.analyze(record, CancellationToken::new())
            .await
            .recommendations
    }

    pub async fn generate_recommendations_with_cancel(
        &self,
        record: &PatientRecord,
        cancel: CancellationToken,
    ) -> Vec<String> {
        self.analyze(record, cancel).await.recommendations
    }

    /// Like [`generate_recommendations`](Self::generate_recommendations) but
    /// reports where the answer came from.
    pub async fn analyze(&self, record: &PatientRecord, cancel: CancellationToken) -> Analysis {
        let hinted_risk = record.supplied_risk_level().unwrap_or_default();
        if !self.is_ready() {
            let err = AdvisorError::NotReady;
            warn!(
                target: LOG_TARGET,
                stage = %PipelineStage::Lifecycle,
                state = %self.state(),
                "request while not ready; serving fallback"
            );
            return Analysis::fallback(hinted_risk, None, &err);
        }

        let context = match extract_context(record) {
            Ok(context) => context,
            Err(err) => {
                warn!(target: LOG_TARGET, stage = %PipelineStage::Context, error = %err, "context extraction failed; serving fallback");
                return Analysis::fallback(hinted_risk, None, &err);
            }
        };
        self.analyze_context(&context, cancel).await
    }

    /// Runs the pipeline for an already extracted context.
    pub async fn analyze_context(&self, context: &PatientContext, cancel: CancellationToken) -> Analysis {
        let started = Instant::now();
        let fingerprint = match Fingerprint::of(context) {
            Ok(fp) => fp,
            Err(err) => {
                let err = AdvisorError::from(err);
                warn!(target: LOG_TARGET, stage = %PipelineStage::Fingerprint, error = %err, "fingerprint failed; serving fallback");
                return Analysis::fallback(context.risk_level, None, &err);
            }
        };

        match self.run_pipeline(context, &fingerprint, &cancel).await {
            Ok(analysis) => {
                info!(
                    target: LOG_TARGET,
                    fingerprint = %fingerprint,
                    source = ?analysis.source,
                    count = analysis.recommendations.len(),
                    inference_degraded = analysis.inference_degraded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "recommendations generated"
                );
                analysis
            }
            Err(StageFailure { stage, error }) => {
                warn!(
                    target: LOG_TARGET,
                    fingerprint = %fingerprint,
                    stage = %stage,
                    kind = error.kind(),
                    error = %error,
                    "pipeline failed; serving fallback"
                );
                Analysis::fallback(context.risk_level, Some(&fingerprint), &error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        context: &PatientContext,
        fingerprint: &Fingerprint,
        cancel: &CancellationToken,
    ) -> std::result::Result<Analysis, StageFailure> {
        if let Some(hit) = self.probe_cache(fingerprint, context, true) {
            return Ok(self.cached_analysis(context, fingerprint, hit));
        }

        let _flight = tokio::select! {
            guard = self.flight.acquire(fingerprint) => guard,
            _ = cancel.cancelled() => {
                return Err(StageFailure { stage: PipelineStage::CacheProbe, error: AdvisorError::Cancelled });
            }
        };
        // another request may have filled the entry while we waited; this
        // request's lookup was already counted above
        if let Some(hit) = self.probe_cache(fingerprint, context, false) {
            return Ok(self.cached_analysis(context, fingerprint, hit));
        }

        let knowledge = self
            .knowledge
            .read()
            .clone()
            .ok_or(AdvisorError::NotReady)
            .map_err(StageFailure::at(PipelineStage::Aggregation))?;

        let aggregated = self.aggregate(context, knowledge.as_ref(), cancel).await?;
        if cancel.is_cancelled() {
            return Err(StageFailure {
                stage: PipelineStage::Aggregation,
                error: AdvisorError::Cancelled,
            });
        }
        if aggregated.candidates.is_empty() {
            return Err(StageFailure {
                stage: PipelineStage::Aggregation,
                error: AdvisorError::Inference("no candidate recommendations".into()),
            });
        }

        let validation = self.validator.validate(&aggregated.candidates, context);
        if !validation.is_valid {
            for conflict in &validation.conflicts {
                warn!(target: LOG_TARGET, fingerprint = %fingerprint, stage = %PipelineStage::Validation, conflict = %conflict, "recommendation conflict");
            }
            return Err(StageFailure {
                stage: PipelineStage::Validation,
                error: AdvisorError::ValidationConflict {
                    conflicts: validation.conflicts,
                },
            });
        }

        let scorer = Scorer::new(context, knowledge.as_ref(), &self.feedback);
        let ranked = scorer.rank(aggregated.candidates, context);
        debug!(target: LOG_TARGET, fingerprint = %fingerprint, stage = %PipelineStage::Scoring, ranked = ?ranked, "candidates ranked");

        if cancel.is_cancelled() {
            return Err(StageFailure {
                stage: PipelineStage::CacheWrite,
                error: AdvisorError::Cancelled,
            });
        }

        let recommendations: Vec<String> = ranked.iter().map(|r| r.text.clone()).collect();
        let top_score = ranked.first().map(|r| r.score).unwrap_or_default();
        let entry = CacheEntry::new(recommendations.clone(), context.clone(), top_score);
        if let Err(err) = self.cache.set(fingerprint.clone(), entry) {
            warn!(target: LOG_TARGET, fingerprint = %fingerprint, stage = %PipelineStage::CacheWrite, error = %err, "cache write skipped");
        }

        Ok(Analysis {
            fingerprint: Some(fingerprint.as_str().to_string()),
            risk_level: context.risk_level,
            source: RecommendationSource::Computed,
            recommendations,
            ranked,
            inference_degraded: aggregated.inference_degraded,
            failure: None,
        })
    }

    fn probe_cache(&self, fingerprint: &Fingerprint, context: &PatientContext, counted: bool) -> Option<CacheEntry> {
        let accept = |entry: &CacheEntry| {
            let score = self.similarity.score(context, &entry.context);
            debug!(target: LOG_TARGET, fingerprint = %fingerprint, similarity = score, "cached context compared");
            score >= self.similarity.threshold()
        };
        let read = if counted {
            self.cache.get_accepted(fingerprint, &accept)
        } else {
            self.cache.peek_accepted(fingerprint, &accept)
        };
        match read {
            Ok(Some(entry)) => {
                debug!(target: LOG_TARGET, fingerprint = %fingerprint, "cache hit");
                Some(entry)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(target: LOG_TARGET, fingerprint = %fingerprint, stage = %PipelineStage::CacheProbe, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    fn cached_analysis(&self, context: &PatientContext, fingerprint: &Fingerprint, entry: CacheEntry) -> Analysis {
        Analysis {
            fingerprint: Some(fingerprint.as_str().to_string()),
            risk_level: context.risk_level,
            source: RecommendationSource::Cache,
            recommendations: entry.recommendations,
            ranked: Vec::new(),
            inference_degraded: false,
            failure: None,
        }
    }

    /// Evidence, then model-derived items, then similar feedback; first
    /// occurrence wins on duplicates.
    async fn aggregate(
        &self,
        context: &PatientContext,
        knowledge: &dyn KnowledgeBase,
        cancel: &CancellationToken,
    ) -> std::result::Result<Aggregated, StageFailure> {
        let mut candidates = Candidates::default();

        for diagnosis in &context.diagnoses {
            for entry in knowledge.at_level(diagnosis, EvidenceLevel::A) {
                candidates.extend(entry.recommendations);
            }
        }

        let rule_items = self.rules.candidates(context);
        let description = describe_context(context);
        let embedded = tokio::select! {
            result = self.embedder.embed(&description) => result,
            _ = cancel.cancelled() => {
                return Err(StageFailure { stage: PipelineStage::Inference, error: AdvisorError::Cancelled });
            }
        };

        let inference_degraded = match embedded {
            Ok(vector) => {
                candidates.extend(self.feedback.nearest_notes(
                    &vector,
                    self.config.embedding.min_cosine,
                    self.config.embedding.max_neighbours,
                ));
                candidates.extend(rule_items);
                candidates.extend(
                    self.feedback
                        .effective_notes_similar_to(context, &self.similarity),
                );
                false
            }
            Err(err) => {
                let err = AdvisorError::from(err);
                warn!(
                    target: LOG_TARGET,
                    stage = %PipelineStage::Inference,
                    kind = err.kind(),
                    error = %err,
                    "inference unavailable; using evidence and rule-based items only"
                );
                candidates.extend(rule_items);
                true
            }
        };

        Ok(Aggregated {
            candidates: candidates.into_vec(),
            inference_degraded,
        })
    }

    /// Records clinician feedback, embedding it on a best-effort basis.
    pub async fn submit_feedback(&self, record: FeedbackRecord) -> Result<StoredFeedback> {
        if self.state() == ServiceState::ShutDown {
            return Err(AdvisorError::NotReady);
        }
        let embedding = match self.embedder.embed(&describe_feedback(&record)).await {
            Ok(vector) => Some(vector),
            Err(err) => {
                debug!(target: LOG_TARGET, stage = %PipelineStage::Feedback, error = %err, "feedback stored without embedding");
                None
            }
        };
        // recording may rewrite the persisted snapshot, which is blocking I/O
        let store = Arc::clone(&self.feedback);
        let stored = tokio::task::spawn_blocking(move || store.record_with_embedding(record, embedding))
            .await
            .map_err(|err| AdvisorError::Initialization(format!("feedback store: {err}")))?;
        info!(
            target: LOG_TARGET,
            stage = %PipelineStage::Feedback,
            id = stored.id,
            effective = stored.record.effective,
            embedded = stored.embedding.is_some(),
            "feedback recorded"
        );
        Ok(stored)
    }

    /// Knowledge entries for one diagnosis, all grades.
    pub fn knowledge_for(&self, diagnosis: &str) -> Result<Vec<KnowledgeEntry>> {
        let knowledge = self.knowledge.read().clone().ok_or(AdvisorError::NotReady)?;
        let mut entries = knowledge.recommendations_for(diagnosis);
        entries.sort_by_key(|entry| entry.evidence_level);
        Ok(entries)
    }

    pub fn cache_stats(&self) -> Option<StatsSnapshot> {
        self.cache.stats_snapshot()
    }

    pub fn feedback_stats(&self) -> FeedbackStatsSnapshot {
        self.feedback.stats_snapshot()
    }

    pub fn feedback_store(&self) -> &SharedFeedbackStore {
        &self.feedback
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.embedder.breaker_state()
    }

    /// Eviction events from the cache, when the backend emits them.
    pub fn subscribe_evictions(&self) -> Option<broadcast::Receiver<EvictionEvent>> {
        self.cache.eviction_signal().map(|signal| signal.subscribe())
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            state: self.state(),
            cache: self.cache_stats(),
            feedback: self.feedback_stats(),
            in_flight: self.flight.in_flight(),
            embedding_model: self.embedder.model_id().to_string(),
            embedding_circuit: format!("{:?}", self.embedder.breaker_state()).to_lowercase(),
        }
    }
}

/// Ordered, duplicate-free candidate list.
#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl Candidates {
    fn extend(&mut self, items: impl IntoIterator<Item = String>) {
        for item in items {
            let trimmed = item.trim();
            if trimmed.is_empty() || self.seen.contains(trimmed) {
                continue;
            }
            self.seen.insert(trimmed.to_string());
            self.items.push(trimmed.to_string());
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
