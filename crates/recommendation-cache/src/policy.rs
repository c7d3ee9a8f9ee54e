use std::time::Duration;

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Dual eviction policy: entry count and entry age.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub capacity: usize,
    pub ttl_ms: i64,
}

impl CachePolicy {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = ttl.as_millis().min(i64::MAX as u128) as i64;
        self
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl_ms: DEFAULT_TTL_MS,
        }
    }
}
