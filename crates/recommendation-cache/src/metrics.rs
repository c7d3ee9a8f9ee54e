use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Clone, Default)]
pub struct CacheStats {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    hits: AtomicU64,
    misses: AtomicU64,
    rejections: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.inner.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// An entry existed but its context was not close enough to serve.
    pub fn record_rejection(&self) {
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        self.inner.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inner.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.inner.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.inner.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        StatsSnapshot {
            hits,
            misses,
            rejections: self.inner.rejections.load(Ordering::Relaxed),
            inserts: self.inner.inserts.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            expirations: self.inner.expirations.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by a similarity rejection; included in `misses`.
    pub rejections: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_count_as_misses() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_rejection();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.rejections, 1);
        assert_eq!(snapshot.hit_rate, 0.5);
    }
}
