// ── Central state store ──
//
// Single owner of the four durable state sections: discovery snapshot,
// offline queue, translation cache, and last-sync timestamp, plus the
// process-wide endpoint state. Each section sits behind its own mutex
// (single-writer discipline) because discovery, translation, and sync
// are triggered concurrently by independent events.
//
// Every mutation is written through to the key-value collaborator; a
// write failure flips the store into in-memory-only operation for the
// rest of the process instead of failing the caller.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::TranslationCache;
use crate::model::{
    CacheKey, DeviceDescriptor, DiscoverySnapshot, DiscoveryStats, EndpointState,
    OfflineQueueItem, TranslationResult, TransportMode,
};
use crate::persist::{KeyValueStore, keys};
use crate::queue::OfflineQueue;

/// Persisted record of the preferred-device choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreferredRecord {
    ip: Ipv4Addr,
    #[serde(default)]
    pinned: bool,
}

/// Owner of all engine state. Constructed once at startup and shared
/// by handle; see the runtime for lifecycle.
pub struct StateStore {
    kv: Arc<dyn KeyValueStore>,
    cloud_url: Url,
    discovery: Mutex<DiscoverySnapshot>,
    queue: Mutex<OfflineQueue>,
    cache: Mutex<TranslationCache>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    endpoint: watch::Sender<EndpointState>,
    degraded: AtomicBool,
}

impl StateStore {
    /// Open the store, loading every persisted section. Unreadable
    /// sections fall back to defaults; the engine must come up even
    /// with a wiped or corrupt backing store.
    pub async fn open(kv: Arc<dyn KeyValueStore>, cloud_url: Url) -> Self {
        let devices: Vec<DeviceDescriptor> = load_section(&*kv, keys::DEVICES).await;
        let preferred: Option<PreferredRecord> = load_section(&*kv, keys::PREFERRED).await;
        let stats: DiscoveryStats = load_section(&*kv, keys::STATS).await;
        let last_discovery: Option<DateTime<Utc>> =
            load_section(&*kv, keys::LAST_DISCOVERY).await;
        let queue: OfflineQueue = load_section(&*kv, keys::OFFLINE_QUEUE).await;
        let cache: TranslationCache = load_section(&*kv, keys::TRANSLATION_CACHE).await;
        let last_sync: Option<DateTime<Utc>> = load_section(&*kv, keys::LAST_SYNC).await;

        let snapshot = DiscoverySnapshot {
            devices,
            preferred: preferred.as_ref().map(|p| p.ip),
            preferred_pinned: preferred.as_ref().is_some_and(|p| p.pinned),
            stats,
            last_discovery,
        };

        // Start in EdgeActive when a preferred device survived the
        // restart; a runtime failure will demote it soon enough if it
        // is gone.
        let initial_endpoint = match snapshot.preferred_device() {
            Some(device) => {
                info!(ip = %device.ip_address, "starting with persisted edge device");
                EndpointState::edge_active(device)
            }
            None => EndpointState::cloud_only(cloud_url.clone()),
        };
        let (endpoint, _) = watch::channel(initial_endpoint);

        Self {
            kv,
            cloud_url,
            discovery: Mutex::new(snapshot),
            queue: Mutex::new(queue),
            cache: Mutex::new(cache),
            last_sync: Mutex::new(last_sync),
            endpoint,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn cloud_url(&self) -> &Url {
        &self.cloud_url
    }

    // ── Discovery snapshot ───────────────────────────────────────────

    pub async fn discovery_snapshot(&self) -> DiscoverySnapshot {
        self.discovery.lock().await.clone()
    }

    /// Replace the discovery snapshot and persist all of its sections.
    pub async fn apply_discovery(&self, snapshot: DiscoverySnapshot) {
        let preferred = snapshot.preferred.map(|ip| PreferredRecord {
            ip,
            pinned: snapshot.preferred_pinned,
        });

        self.persist(keys::DEVICES, &snapshot.devices).await;
        self.persist(keys::PREFERRED, &preferred).await;
        self.persist(keys::STATS, &snapshot.stats).await;
        self.persist(keys::LAST_DISCOVERY, &snapshot.last_discovery)
            .await;

        *self.discovery.lock().await = snapshot;
    }

    /// Set (and pin) the preferred device. Fails silently if the
    /// address is unknown -- callers verify membership first.
    pub async fn set_preferred(&self, ip: Ipv4Addr, pinned: bool) {
        let mut snapshot = self.discovery.lock().await;
        if !snapshot.contains(ip) {
            return;
        }
        snapshot.preferred = Some(ip);
        snapshot.preferred_pinned = pinned;

        let record = Some(PreferredRecord { ip, pinned });
        drop(snapshot);
        self.persist(keys::PREFERRED, &record).await;
    }

    // ── Offline queue ────────────────────────────────────────────────

    /// Append a request to the offline queue, evicting the oldest item
    /// at capacity.
    pub async fn enqueue_offline(&self, item: OfflineQueueItem) {
        let mut queue = self.queue.lock().await;
        if let Some(evicted) = queue.enqueue(item) {
            warn!(
                enqueued_at = %evicted.enqueued_at,
                "offline queue full -- evicted oldest request"
            );
        }
        let snapshot = queue.clone();
        drop(queue);
        self.persist(keys::OFFLINE_QUEUE, &snapshot).await;
    }

    pub async fn queue_items(&self) -> Vec<OfflineQueueItem> {
        self.queue.lock().await.drain()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Remove exactly the given items (the ones that synced).
    pub async fn remove_queue_items(&self, items: &[OfflineQueueItem]) -> usize {
        let mut queue = self.queue.lock().await;
        let removed = queue.remove(items);
        let snapshot = queue.clone();
        drop(queue);
        self.persist(keys::OFFLINE_QUEUE, &snapshot).await;
        removed
    }

    // ── Translation cache ────────────────────────────────────────────

    pub async fn cache_get(&self, key: &CacheKey) -> Option<TranslationResult> {
        self.cache.lock().await.get(key).map(|e| e.result.clone())
    }

    pub async fn cache_put(&self, key: &CacheKey, result: TranslationResult) {
        let mut cache = self.cache.lock().await;
        cache.put(key, result);
        let snapshot = cache.clone();
        drop(cache);
        self.persist(keys::TRANSLATION_CACHE, &snapshot).await;
    }

    pub async fn cache_clear(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
        let snapshot = cache.clone();
        drop(cache);
        self.persist(keys::TRANSLATION_CACHE, &snapshot).await;
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }

    // ── Endpoint state ───────────────────────────────────────────────

    pub fn endpoint_state(&self) -> EndpointState {
        self.endpoint.borrow().clone()
    }

    /// Subscribe to endpoint-state changes (read by status UIs).
    pub fn subscribe_endpoint(&self) -> watch::Receiver<EndpointState> {
        self.endpoint.subscribe()
    }

    /// Route traffic to a verified edge device.
    pub fn promote_edge(&self, device: &DeviceDescriptor) {
        info!(ip = %device.ip_address, quality = device.quality, "edge device active");
        let _ = self.endpoint.send(EndpointState::edge_active(device));
    }

    /// Runtime failure of the active edge endpoint: keep the device
    /// configured but move traffic to the cloud.
    pub fn demote_edge(&self) {
        let state = self.endpoint.borrow().clone();
        if state.transport == TransportMode::EdgeActive {
            warn!(endpoint = %state.endpoint, "edge endpoint failed -- degrading to cloud");
            let _ = self.endpoint.send(EndpointState {
                transport: TransportMode::Degraded,
                endpoint: self.cloud_url.clone(),
                is_edge: false,
            });
        }
    }

    /// No edge device is usable; cloud is the only transport.
    pub fn mark_cloud_only(&self) {
        let state = self.endpoint.borrow().clone();
        if state.transport != TransportMode::CloudOnly {
            debug!("transport now cloud-only");
            let _ = self
                .endpoint
                .send(EndpointState::cloud_only(self.cloud_url.clone()));
        }
    }

    // ── Sync metadata ────────────────────────────────────────────────

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.lock().await
    }

    pub async fn set_last_sync(&self, at: DateTime<Utc>) {
        *self.last_sync.lock().await = Some(at);
        self.persist(keys::LAST_SYNC, &Some(at)).await;
    }

    // ── Persistence plumbing ─────────────────────────────────────────

    /// Write one section through to the collaborator. After the first
    /// failure the store stops writing and serves from memory only.
    async fn persist<T: Serialize>(&self, key: &str, value: &T) {
        if self.degraded.load(Ordering::Relaxed) {
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "unserializable state section");
                return;
            }
        };
        if let Err(e) = self.kv.put(key, raw).await {
            if !self.degraded.swap(true, Ordering::Relaxed) {
                warn!(key, error = %e, "store unavailable -- continuing in-memory only");
            }
        }
    }
}

/// Load one persisted section, defaulting on any failure.
async fn load_section<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &str) -> T {
    match kv.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "corrupt state section -- using default");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "unreadable state section -- using default");
            T::default()
        }
    }
}
