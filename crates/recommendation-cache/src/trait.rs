use crate::errors::CacheError;
use crate::events::EvictionSignal;
use crate::key::Fingerprint;
use crate::layer::local_lru::CacheEntry;
use crate::metrics::StatsSnapshot;

/// Fingerprint-addressed store of validated recommendation bundles.
///
/// Implementations are best-effort: callers treat any error as a miss.
pub trait RecommendationCache: Send + Sync {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError>;

    fn set(&self, fingerprint: Fingerprint, entry: CacheEntry) -> Result<(), CacheError>;

    /// Reads an entry that only counts as a hit when `accept` approves it.
    ///
    /// A rejected entry stays in place and is reported as a miss.
    fn get_accepted(
        &self,
        fingerprint: &Fingerprint,
        accept: &dyn Fn(&CacheEntry) -> bool,
    ) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.get(fingerprint)?.filter(|entry| accept(entry)))
    }

    /// Like [`get_accepted`](Self::get_accepted) but leaves counters and
    /// recency untouched, for re-reads within a request already counted.
    fn peek_accepted(
        &self,
        fingerprint: &Fingerprint,
        accept: &dyn Fn(&CacheEntry) -> bool,
    ) -> Result<Option<CacheEntry>, CacheError> {
        self.get_accepted(fingerprint, accept)
    }

    /// Counters, for backends that keep them.
    fn stats_snapshot(&self) -> Option<StatsSnapshot> {
        None
    }

    /// Eviction notifications, for backends that emit them.
    fn eviction_signal(&self) -> Option<EvictionSignal> {
        None
    }
}
