use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use careadvisor_core_types::{FeedbackRecord, PatientContext};
use careadvisor_similarity::{cosine, SimilarityEngine};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("feedback store data invalid: {0}")]
    Parse(String),
    #[error("feedback snapshot could not replace {path}: {source}")]
    Replace {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A feedback record as held by the store, with the optional context
/// embedding computed when it was submitted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredFeedback {
    pub id: u64,
    pub record: FeedbackRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Append-only, capacity-bounded history of recommendation outcomes.
///
/// When full, recording a new outcome drops the oldest one.
pub struct FeedbackStore {
    inner: RwLock<VecDeque<StoredFeedback>>,
    capacity: usize,
    storage_path: Option<PathBuf>,
    // held across snapshot + write so a newer snapshot is never overwritten
    persist_lock: Mutex<()>,
    next_id: AtomicU64,
    metrics: FeedbackMetrics,
}

#[derive(Default)]
struct FeedbackMetrics {
    recorded: AtomicU64,
    dropped: AtomicU64,
    lookups: AtomicU64,
    hits: AtomicU64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackStatsSnapshot {
    pub capacity: usize,
    pub current_records: u64,
    pub effective_records: u64,
    pub recorded: u64,
    pub dropped: u64,
    pub lookups: u64,
    pub hit_lookups: u64,
}

impl Default for FeedbackStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl FeedbackStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            storage_path: None,
            persist_lock: Mutex::new(()),
            next_id: AtomicU64::new(1),
            metrics: FeedbackMetrics::default(),
        }
    }

    /// Opens a store backed by a JSON file, loading whatever it already holds.
    ///
    /// Only the newest `capacity` records survive the load. Every record is
    /// followed by a full snapshot written to a sibling temp file and renamed
    /// over the target, so readers never see a partial file. The write is
    /// blocking; async callers should record from the blocking pool.
    pub fn with_persistence(
        path: impl Into<PathBuf>,
        capacity: usize,
    ) -> Result<Self, FeedbackError> {
        let path = path.into();
        let mut store = Self::new(capacity);
        store.storage_path = Some(path.clone());

        if path.exists() {
            let bytes = fs::read(&path)?;
            if !bytes.is_empty() {
                let mut records: Vec<StoredFeedback> = serde_json::from_slice(&bytes)
                    .map_err(|err| FeedbackError::Parse(format!("{err}")))?;
                if records.len() > store.capacity {
                    let excess = records.len() - store.capacity;
                    records.drain(..excess);
                }
                let max_id = records.iter().map(|r| r.id).max().unwrap_or(0);
                store.next_id.store(max_id + 1, Ordering::Relaxed);
                store.inner.get_mut().extend(records);
            }
        }

        Ok(store)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn record(&self, record: FeedbackRecord) -> StoredFeedback {
        self.record_with_embedding(record, None)
    }

    pub fn record_with_embedding(
        &self,
        record: FeedbackRecord,
        embedding: Option<Vec<f32>>,
    ) -> StoredFeedback {
        let stored = StoredFeedback {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            record,
            embedding,
        };
        let dropped = {
            let mut guard = self.inner.write();
            let dropped = if guard.len() >= self.capacity {
                guard.pop_front()
            } else {
                None
            };
            guard.push_back(stored.clone());
            dropped
        };
        self.metrics.recorded.fetch_add(1, Ordering::Relaxed);
        if let Some(old) = dropped {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(target: "feedback_store", dropped_id = old.id, "feedback buffer full; dropped oldest record");
        }
        if let Err(err) = self.persist_to_disk() {
            warn!(target: "feedback_store", error = %err, "feedback persist failed after record");
        }
        stored
    }

    /// Effective records whose projected context is similar to `context`.
    ///
    /// Each record is projected with the caller's current vitals.
    pub fn effective_similar_to(
        &self,
        context: &PatientContext,
        engine: &SimilarityEngine,
    ) -> Vec<FeedbackRecord> {
        let matches: Vec<FeedbackRecord> = self
            .inner
            .read()
            .iter()
            .filter(|stored| stored.record.effective)
            .filter(|stored| {
                let projected = stored.record.as_context(context.vitals.clone());
                engine.similar(context, &projected)
            })
            .map(|stored| stored.record.clone())
            .collect();
        self.metrics.record_lookup(!matches.is_empty());
        matches
    }

    /// Deduplicated notes of the effective, similar records, in first-seen order.
    pub fn effective_notes_similar_to(
        &self,
        context: &PatientContext,
        engine: &SimilarityEngine,
    ) -> Vec<String> {
        dedup_notes(
            self.effective_similar_to(context, engine)
                .into_iter()
                .map(|record| record.notes),
        )
    }

    /// Notes of effective records whose stored embedding is within
    /// `min_cosine` of `vector`, most similar first.
    pub fn nearest_notes(&self, vector: &[f32], min_cosine: f64, limit: usize) -> Vec<String> {
        let mut scored: Vec<(f64, String)> = self
            .inner
            .read()
            .iter()
            .filter(|stored| stored.record.effective)
            .filter_map(|stored| {
                let embedding = stored.embedding.as_ref()?;
                let score = cosine(vector, embedding);
                (score >= min_cosine).then(|| (score, stored.record.notes.clone()))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        let mut notes = dedup_notes(scored.into_iter().map(|(_, note)| note));
        notes.truncate(limit);
        notes
    }

    /// Number of effective records whose notes mention `text`.
    pub fn positive_mentions(&self, text: &str) -> usize {
        self.inner
            .read()
            .iter()
            .filter(|stored| stored.record.effective && stored.record.mentions(text))
            .count()
    }

    /// Newest records first.
    pub fn list(&self, limit: Option<usize>) -> Vec<StoredFeedback> {
        let guard = self.inner.read();
        let take = limit.unwrap_or(guard.len());
        guard.iter().rev().take(take).cloned().collect()
    }

    pub fn persist_now(&self) -> Result<(), FeedbackError> {
        self.persist_to_disk()
    }

    pub fn stats_snapshot(&self) -> FeedbackStatsSnapshot {
        let (current, effective) = {
            let guard = self.inner.read();
            let effective = guard.iter().filter(|s| s.record.effective).count();
            (guard.len(), effective)
        };
        FeedbackStatsSnapshot {
            capacity: self.capacity,
            current_records: current as u64,
            effective_records: effective as u64,
            recorded: self.metrics.recorded.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            lookups: self.metrics.lookups.load(Ordering::Relaxed),
            hit_lookups: self.metrics.hits.load(Ordering::Relaxed),
        }
    }

    fn persist_to_disk(&self) -> Result<(), FeedbackError> {
        let Some(path) = self.storage_path.as_ref() else {
            return Ok(());
        };
        let _persist = self.persist_lock.lock();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let snapshot: Vec<StoredFeedback> = self.inner.read().iter().cloned().collect();
        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            serde_json::to_writer(&mut writer, &snapshot)
                .map_err(|err| FeedbackError::Parse(format!("{err}")))?;
            writer.flush()?;
        }
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|err| FeedbackError::Replace {
            path: path.display().to_string(),
            source: err.error,
        })?;
        debug!(target: "feedback_store", records = snapshot.len(), path = %path.display(), "feedback snapshot written");
        Ok(())
    }
}

pub type SharedFeedbackStore = Arc<FeedbackStore>;

impl FeedbackMetrics {
    fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn dedup_notes<I>(notes: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for note in notes {
        let trimmed = note.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{Medication, RiskLevel};

    fn feedback(age: u32, dx: &str, effective: bool, notes: &str) -> FeedbackRecord {
        FeedbackRecord::new(age, RiskLevel::High, effective, notes).with_diagnoses([dx])
    }

    fn context(age: u32, dx: &str) -> PatientContext {
        PatientContext::new(age, RiskLevel::High).with_diagnoses([dx])
    }

    #[test]
    fn ring_buffer_drops_oldest_when_full() {
        let store = FeedbackStore::new(2);
        store.record(feedback(70, "a", true, "first"));
        store.record(feedback(70, "a", true, "second"));
        store.record(feedback(70, "a", true, "third"));

        let notes: Vec<String> = store.list(None).into_iter().map(|s| s.record.notes).collect();
        assert_eq!(notes, vec!["third".to_string(), "second".to_string()]);
        let stats = store.stats_snapshot();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.current_records, 2);
    }

    #[test]
    fn retrieval_keeps_only_effective_and_similar() {
        let store = FeedbackStore::new(16);
        store.record(feedback(71, "pneumonia", true, "Early mobilisation"));
        store.record(feedback(72, "pneumonia", false, "Ineffective note"));
        store.record(feedback(30, "fracture", true, "Unrelated case"));
        store.record(feedback(69, "pneumonia", true, "Early mobilisation"));

        let engine = SimilarityEngine::default();
        let notes = store.effective_notes_similar_to(&context(70, "pneumonia"), &engine);
        assert_eq!(notes, vec!["Early mobilisation".to_string()]);
        assert_eq!(store.stats_snapshot().hit_lookups, 1);
    }

    #[test]
    fn medication_overlap_counts_towards_similarity() {
        let store = FeedbackStore::new(4);
        let with_meds = feedback(70, "pneumonia", true, "Check QT interval")
            .with_medications(vec![Medication::named("azithromycin")]);
        store.record(with_meds);
        let engine = SimilarityEngine::default();
        let ctx = context(70, "pneumonia");
        // No medications on the live context: 0.4 + 0.3 + 0.0 < 0.85.
        assert!(store.effective_similar_to(&ctx, &engine).is_empty());
        let ctx = ctx.with_medications(vec![Medication::named("azithromycin")]);
        assert_eq!(store.effective_similar_to(&ctx, &engine).len(), 1);
    }

    #[test]
    fn positive_mentions_count_effective_records() {
        let store = FeedbackStore::new(8);
        store.record(feedback(70, "a", true, "assess fall risk done, helpful"));
        store.record(feedback(70, "a", true, "ASSESS FALL RISK"));
        store.record(feedback(70, "a", false, "assess fall risk"));
        assert_eq!(store.positive_mentions("Assess fall risk"), 2);
    }

    #[test]
    fn nearest_notes_rank_by_cosine() {
        let store = FeedbackStore::new(8);
        store.record_with_embedding(feedback(70, "a", true, "close"), Some(vec![1.0, 0.1]));
        store.record_with_embedding(feedback(70, "a", true, "closest"), Some(vec![1.0, 0.0]));
        store.record_with_embedding(feedback(70, "a", true, "far"), Some(vec![0.0, 1.0]));
        store.record(feedback(70, "a", true, "no vector"));

        let notes = store.nearest_notes(&[1.0, 0.0], 0.9, 5);
        assert_eq!(notes, vec!["closest".to_string(), "close".to_string()]);
    }

    #[test]
    fn concurrent_writers_leave_a_complete_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.json");
        let store = Arc::new(FeedbackStore::with_persistence(&path, 100).unwrap());

        let writers: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for idx in 0..10 {
                        store.record(feedback(60, "copd", true, &format!("w{worker} n{idx}")));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reopened = FeedbackStore::with_persistence(&path, 100).unwrap();
        assert_eq!(reopened.len(), 40);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "only the snapshot itself remains");
    }

    #[test]
    fn mixed_case_feedback_matches_normalised_context() {
        let store = FeedbackStore::new(8);
        store.record(
            FeedbackRecord::new(72, RiskLevel::High, true, "Early chest physiotherapy")
                .with_diagnoses(["Pneumonia"])
                .with_medications(vec![Medication::named("Ceftriaxone")]),
        );
        let ctx = context(70, "pneumonia").with_medications(vec![Medication::named("ceftriaxone")]);
        assert_eq!(
            store.effective_notes_similar_to(&ctx, &SimilarityEngine::default()),
            vec!["Early chest physiotherapy".to_string()]
        );
    }

    #[test]
    fn persistence_round_trips_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.json");
        {
            let store = FeedbackStore::with_persistence(&path, 10).unwrap();
            for idx in 0..5 {
                store.record(feedback(60, "copd", true, &format!("note {idx}")));
            }
        }
        let reopened = FeedbackStore::with_persistence(&path, 3).unwrap();
        assert_eq!(reopened.len(), 3);
        let newest = reopened.list(Some(1)).remove(0);
        assert_eq!(newest.record.notes, "note 4");
        let next = reopened.record(feedback(60, "copd", true, "note 5"));
        assert!(next.id > newest.id);
    }
}
