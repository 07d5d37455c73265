// ── Domain model ──

mod device;
mod request;
mod snapshot;

pub use device::{Capabilities, DeviceDescriptor};
pub use request::{
    CacheEntry, CacheKey, OfflineQueueItem, ResultSource, TranslationJob, TranslationResult,
};
pub use snapshot::{
    DiscoverySnapshot, DiscoveryStats, EndpointState, OctetRange, TransportMode,
};
