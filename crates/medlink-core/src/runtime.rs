// ── Runtime abstraction ──
//
// Full lifecycle management for the discovery/sync engine: owns the
// state store, wires the selector, discovery engine, and reconciler
// together, and runs the event-driven background tasks (connectivity
// reactions, optional periodic rediscovery).

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use medlink_api::TransportConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::connectivity::{ConnectivityHandle, ConnectivityState};
use crate::discovery::{
    AnnouncementSource, DiscoverOptions, DiscoveryConfig, DiscoveryEngine, DiscoveryReport,
    NoAnnouncement,
};
use crate::error::CoreError;
use crate::model::{
    DeviceDescriptor, DiscoverySnapshot, EndpointState, TranslationJob, TranslationResult,
    TransportMode,
};
use crate::persist::KeyValueStore;
use crate::selector::{EndpointSelector, NoOfflineTranslator, OfflineTranslator};
use crate::store::StateStore;
use crate::sync::{SyncOutcome, SyncReconciler};

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Cloud translation API base URL.
    pub cloud_url: Url,
    /// Request timeouts for translate traffic.
    pub transport: TransportConfig,
    pub discovery: DiscoveryConfig,
    /// Periodic rediscovery interval in seconds. 0 = event-driven only.
    pub rediscovery_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cloud_url: Url::parse("https://api.medtranslate.ai/")
                .expect("default cloud URL is valid"),
            transport: TransportConfig::default(),
            discovery: DiscoveryConfig::default(),
            rediscovery_interval_secs: 0,
        }
    }
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<RuntimeInner>`. Construct once at
/// startup, call [`start()`](Self::start) to spawn the background
/// tasks, and hand clones to whatever triggers translation.
#[derive(Clone)]
pub struct EdgeRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    store: Arc<StateStore>,
    engine: DiscoveryEngine,
    selector: Arc<EndpointSelector>,
    reconciler: SyncReconciler,
    connectivity: ConnectivityHandle,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    rediscovery_interval_secs: u64,
}

impl EdgeRuntime {
    /// Build the runtime with explicit collaborators.
    pub async fn new(
        config: RuntimeConfig,
        kv: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityHandle,
        offline: Arc<dyn OfflineTranslator>,
        announce: Arc<dyn AnnouncementSource>,
    ) -> Result<Self, CoreError> {
        let store = Arc::new(StateStore::open(kv, config.cloud_url.clone()).await);
        let cancel = CancellationToken::new();

        let selector = Arc::new(EndpointSelector::new(
            Arc::clone(&store),
            connectivity.clone(),
            offline,
            &config.transport,
        )?);

        let engine = DiscoveryEngine::new(
            Arc::clone(&store),
            connectivity.clone(),
            announce,
            config.discovery.clone(),
            cancel.clone(),
        )?;

        let reconciler = SyncReconciler::new(
            Arc::clone(&store),
            Arc::clone(&selector),
            connectivity.clone(),
        );

        Ok(Self {
            inner: Arc::new(RuntimeInner {
                store,
                engine,
                selector,
                reconciler,
                connectivity,
                cancel,
                task_handles: Mutex::new(Vec::new()),
                rediscovery_interval_secs: config.rediscovery_interval_secs,
            }),
        })
    }

    /// Convenience constructor with default collaborators (no local
    /// models, no announcement source).
    pub async fn with_defaults(
        config: RuntimeConfig,
        kv: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityHandle,
    ) -> Result<Self, CoreError> {
        Self::new(
            config,
            kv,
            connectivity,
            Arc::new(NoOfflineTranslator),
            Arc::new(NoAnnouncement),
        )
        .await
    }

    /// Spawn the background tasks: connectivity reactions and, when
    /// configured, periodic rediscovery.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            return;
        }

        let runtime = self.clone();
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(connectivity_task(runtime, cancel)));

        let interval_secs = self.inner.rediscovery_interval_secs;
        if interval_secs > 0 {
            let runtime = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(rediscovery_task(runtime, interval_secs, cancel)));
        }

        info!("edge runtime started");
    }

    /// Cancel and join background tasks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("edge runtime stopped");
    }

    // ── Core operations ──────────────────────────────────────────────

    pub async fn translate(&self, job: TranslationJob) -> Result<TranslationResult, CoreError> {
        self.inner.selector.translate(job).await
    }

    pub async fn discover(&self, options: DiscoverOptions) -> Result<DiscoveryReport, CoreError> {
        self.inner.engine.discover(options).await
    }

    pub async fn sync(&self) -> Result<SyncOutcome, CoreError> {
        self.inner.reconciler.sync().await
    }

    // ── Manual device management ─────────────────────────────────────

    /// Probe an address and, on success, insert it into the persisted
    /// set (becoming preferred if it outranks the field).
    pub async fn add_manual_device(
        &self,
        ip: Ipv4Addr,
        port: u16,
    ) -> Result<DeviceDescriptor, CoreError> {
        let Some(device) = self.inner.engine.verify_device(ip, port).await else {
            return Err(CoreError::DeviceNotFound { ip: ip.to_string() });
        };

        let mut snapshot = self.inner.store.discovery_snapshot().await;
        snapshot.devices.retain(|d| d.ip_address != ip);
        snapshot.devices.push(device.clone());
        snapshot
            .devices
            .sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(std::cmp::Ordering::Equal));

        if !snapshot.preferred_pinned {
            snapshot.preferred = snapshot.devices.first().map(|d| d.ip_address);
        }
        let promoted = snapshot.preferred == Some(ip);
        self.inner.store.apply_discovery(snapshot).await;

        if promoted {
            self.inner.store.promote_edge(&device);
        }
        Ok(device)
    }

    /// Remove a device from the persisted set. If it was preferred,
    /// the next best device (if any) takes over; if it was the active
    /// endpoint, traffic moves to the cloud.
    pub async fn remove_device(&self, ip: Ipv4Addr) -> Result<(), CoreError> {
        let mut snapshot = self.inner.store.discovery_snapshot().await;
        if !snapshot.contains(ip) {
            return Err(CoreError::DeviceNotFound { ip: ip.to_string() });
        }

        snapshot.devices.retain(|d| d.ip_address != ip);
        if snapshot.preferred == Some(ip) {
            snapshot.preferred = snapshot.devices.first().map(|d| d.ip_address);
            snapshot.preferred_pinned = false;
        }
        let next_preferred = snapshot.preferred_device().cloned();
        self.inner.store.apply_discovery(snapshot).await;

        let state = self.inner.store.endpoint_state();
        if state.is_edge && state.endpoint.host_str() == Some(ip.to_string().as_str()) {
            match next_preferred {
                Some(device) => self.inner.store.promote_edge(&device),
                None => self.inner.store.mark_cloud_only(),
            }
        }
        Ok(())
    }

    /// Pin a known device as preferred and make it the active
    /// endpoint. The pin survives discovery re-ranking.
    pub async fn set_preferred_device(&self, ip: Ipv4Addr) -> Result<(), CoreError> {
        let snapshot = self.inner.store.discovery_snapshot().await;
        let Some(device) = snapshot.device(ip).cloned() else {
            return Err(CoreError::DeviceNotFound { ip: ip.to_string() });
        };

        self.inner.store.set_preferred(ip, true).await;
        self.inner.store.promote_edge(&device);
        Ok(())
    }

    // ── State observation ────────────────────────────────────────────

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    pub fn endpoint_state(&self) -> EndpointState {
        self.inner.store.endpoint_state()
    }

    pub fn subscribe_endpoint(&self) -> tokio::sync::watch::Receiver<EndpointState> {
        self.inner.store.subscribe_endpoint()
    }

    pub async fn discovery_snapshot(&self) -> DiscoverySnapshot {
        self.inner.store.discovery_snapshot().await
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// React to connectivity transitions: regained connectivity triggers a
/// sync; regained WiFi while not edge-active triggers a background
/// discovery.
async fn connectivity_task(runtime: EdgeRuntime, cancel: CancellationToken) {
    let mut rx = runtime.inner.connectivity.subscribe();
    let mut previous: ConnectivityState = *rx.borrow();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    debug!("connectivity observer gone -- stopping reactions");
                    break;
                }
                let current = *rx.borrow();
                react(&runtime, previous, current).await;
                previous = current;
            }
        }
    }
}

async fn react(runtime: &EdgeRuntime, previous: ConnectivityState, current: ConnectivityState) {
    // Connectivity regained: reconcile the offline queue.
    if current.is_connected && !previous.is_connected {
        info!("connectivity regained -- starting sync");
        if let Err(e) = runtime.sync().await {
            warn!(error = %e, "sync after reconnect failed");
        }
    }

    // WiFi regained while the edge path is inactive: look for devices.
    let wifi_regained = current.is_wifi() && !previous.is_wifi();
    let edge_inactive = runtime.endpoint_state().transport != TransportMode::EdgeActive;
    if wifi_regained && edge_inactive {
        info!("WiFi regained -- starting background discovery");
        let options = DiscoverOptions {
            background: true,
            merge: false,
        };
        match runtime.discover(options).await {
            Ok(report) if !report.success => debug!("background discovery found nothing"),
            Ok(_) => {}
            Err(CoreError::DiscoveryInProgress) => {}
            Err(e) => warn!(error = %e, "background discovery failed"),
        }
    }
}

/// Periodically rediscover, like any other background refresh.
async fn rediscovery_task(runtime: EdgeRuntime, interval_secs: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let options = DiscoverOptions { background: true, merge: true };
                match runtime.discover(options).await {
                    Ok(_) | Err(CoreError::DiscoveryInProgress | CoreError::NoNetwork) => {}
                    Err(e) => warn!(error = %e, "periodic discovery failed"),
                }
            }
        }
    }
}
