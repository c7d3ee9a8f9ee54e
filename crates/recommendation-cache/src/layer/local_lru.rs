use std::num::NonZeroUsize;
use std::sync::Arc;

use careadvisor_core_types::PatientContext;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::errors::CacheError;
use crate::events::{EvictionReason, EvictionSignal};
use crate::key::Fingerprint;
use crate::metrics::{CacheStats, StatsSnapshot};
use crate::policy::CachePolicy;
use crate::r#trait::RecommendationCache;

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub recommendations: Vec<String>,
    /// Context that produced the recommendations, kept for similarity re-checks.
    pub context: PatientContext,
    /// Assigned by the cache on insert.
    pub created_at_ms: i64,
    pub score: f64,
}

impl CacheEntry {
    pub fn new(recommendations: Vec<String>, context: PatientContext, score: f64) -> Self {
        Self {
            recommendations,
            context,
            created_at_ms: 0,
            score,
        }
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.created_at_ms <= ttl_ms
    }

    pub fn age(&self, now_ms: i64) -> i64 {
        now_ms - self.created_at_ms
    }
}

/// In-process cache bounded by both entry count (LRU) and entry age (TTL).
#[derive(Clone)]
pub struct LruTtlCache {
    inner: Arc<Mutex<LruCache<Fingerprint, CacheEntry>>>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
    signal: EvictionSignal,
}

impl LruTtlCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: CachePolicy, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(policy.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            policy,
            clock,
            stats: CacheStats::default(),
            signal: EvictionSignal::default(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn signal(&self) -> &EvictionSignal {
        &self.signal
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.read(fingerprint, &|_| true, true)
    }

    /// Expired entries are dropped either way; only a `counted` read touches
    /// the hit/miss counters and LRU recency.
    fn read(
        &self,
        fingerprint: &Fingerprint,
        accept: &dyn Fn(&CacheEntry) -> bool,
        counted: bool,
    ) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        let outcome = {
            let mut guard = self.inner.lock();
            let expired = guard
                .peek(fingerprint)
                .map(|entry| !entry.is_fresh(now, self.policy.ttl_ms));
            match expired {
                Some(true) => {
                    guard.pop(fingerprint);
                    Lookup::Expired
                }
                Some(false) => {
                    if !guard.peek(fingerprint).is_some_and(|entry| accept(entry)) {
                        Lookup::Rejected
                    } else if counted {
                        guard.get(fingerprint).cloned().map_or(Lookup::Miss, Lookup::Hit)
                    } else {
                        guard.peek(fingerprint).cloned().map_or(Lookup::Miss, Lookup::Hit)
                    }
                }
                None => Lookup::Miss,
            }
        };

        match outcome {
            Lookup::Hit(entry) => {
                if counted {
                    self.stats.record_hit();
                }
                Some(entry)
            }
            Lookup::Expired => {
                if counted {
                    self.stats.record_miss();
                }
                self.stats.record_expiration();
                self.notify(fingerprint.clone(), EvictionReason::Expired);
                None
            }
            Lookup::Rejected => {
                if counted {
                    self.stats.record_rejection();
                }
                None
            }
            Lookup::Miss => {
                if counted {
                    self.stats.record_miss();
                }
                None
            }
        }
    }

    pub fn insert(&self, fingerprint: Fingerprint, mut entry: CacheEntry) {
        entry.created_at_ms = self.clock.now_ms();
        let displaced = self.inner.lock().push(fingerprint.clone(), entry);
        self.stats.record_insert();
        if let Some((old_key, _)) = displaced {
            if old_key == fingerprint {
                self.notify(old_key, EvictionReason::Replaced);
            } else {
                self.stats.record_eviction();
                self.notify(old_key, EvictionReason::Capacity);
            }
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let removed: Vec<Fingerprint> = {
            let mut guard = self.inner.lock();
            let stale: Vec<Fingerprint> = guard
                .iter()
                .filter(|(_, entry)| !entry.is_fresh(now, self.policy.ttl_ms))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &stale {
                guard.pop(key);
            }
            stale
        };
        let count = removed.len();
        for key in removed {
            self.stats.record_expiration();
            self.notify(key, EvictionReason::Expired);
        }
        count
    }

    // Runs outside the cache lock.
    fn notify(&self, fingerprint: Fingerprint, reason: EvictionReason) {
        debug!(target: "recommendation_cache", fingerprint = %fingerprint, ?reason, "cache entry disposed");
        self.signal.publish(fingerprint, reason);
    }
}

enum Lookup {
    Hit(CacheEntry),
    Expired,
    Rejected,
    Miss,
}

impl RecommendationCache for LruTtlCache {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lookup(fingerprint))
    }

    fn set(&self, fingerprint: Fingerprint, entry: CacheEntry) -> Result<(), CacheError> {
        self.insert(fingerprint, entry);
        Ok(())
    }

    fn get_accepted(
        &self,
        fingerprint: &Fingerprint,
        accept: &dyn Fn(&CacheEntry) -> bool,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.read(fingerprint, accept, true))
    }

    fn peek_accepted(
        &self,
        fingerprint: &Fingerprint,
        accept: &dyn Fn(&CacheEntry) -> bool,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.read(fingerprint, accept, false))
    }

    fn stats_snapshot(&self) -> Option<StatsSnapshot> {
        Some(self.stats.snapshot())
    }

    fn eviction_signal(&self) -> Option<EvictionSignal> {
        Some(self.signal.clone())
    }
}
