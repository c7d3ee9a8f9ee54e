use std::sync::Arc;

use tokio::sync::broadcast;

use crate::key::Fingerprint;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionReason {
    /// Pushed out as least recently used.
    Capacity,
    /// Outlived its time-to-live.
    Expired,
    /// Overwritten by a newer entry under the same fingerprint.
    Replaced,
}

#[derive(Clone, Debug)]
pub struct EvictionEvent {
    pub fingerprint: Fingerprint,
    pub reason: EvictionReason,
}

/// Fire-and-forget notification channel for evictions.
///
/// Publishing never blocks and never fails: lagging or absent subscribers
/// only lose events.
#[derive(Clone)]
pub struct EvictionSignal {
    sender: Arc<broadcast::Sender<EvictionEvent>>,
}

impl EvictionSignal {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(16));
        Self {
            sender: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EvictionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, fingerprint: Fingerprint, reason: EvictionReason) {
        let _ = self.sender.send(EvictionEvent {
            fingerprint,
            reason,
        });
    }
}

impl Default for EvictionSignal {
    fn default() -> Self {
        Self::new(256)
    }
}
