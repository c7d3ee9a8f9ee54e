use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::key::Fingerprint;

/// Per-fingerprint async lock so concurrent misses aggregate only once.
#[derive(Default, Clone)]
pub struct Flight {
    inner: Arc<Mutex<HashMap<Fingerprint, Arc<AsyncMutex<()>>>>>,
}

pub struct FlightGuard {
    _guard: OwnedMutexGuard<()>,
}

impl Flight {
    pub async fn acquire(&self, fingerprint: &Fingerprint) -> FlightGuard {
        let mutex = {
            let mut map = self.inner.lock();
            // Drop locks nobody else holds so the map tracks in-flight keys only.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(fingerprint.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = mutex.lock_owned().await;
        FlightGuard { _guard: guard }
    }

    /// Keys currently held or awaited; idle map entries are not counted.
    pub fn in_flight(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careadvisor_core_types::{PatientContext, RiskLevel};

    #[tokio::test]
    async fn released_keys_are_not_in_flight() {
        let flight = Flight::default();
        let key = Fingerprint::of(&PatientContext::new(70, RiskLevel::High)).unwrap();
        let guard = flight.acquire(&key).await;
        assert_eq!(flight.in_flight(), 1);
        drop(guard);
        assert_eq!(flight.in_flight(), 0);
    }
}
