pub mod clock;
pub mod errors;
pub mod events;
pub mod key;
pub mod layer;
pub mod metrics;
pub mod policy;
pub mod r#trait;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::CacheError;
pub use events::{EvictionEvent, EvictionReason, EvictionSignal};
pub use key::Fingerprint;
pub use layer::local_lru::{CacheEntry, LruTtlCache};
pub use layer::singleflight::{Flight, FlightGuard};
pub use metrics::{CacheStats, StatsSnapshot};
pub use policy::CachePolicy;
pub use r#trait::RecommendationCache;
