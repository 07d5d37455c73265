// ── Discovery engine ──
//
// Orchestrates one discovery run: assemble candidates from the three
// sources, probe them through a bounded worker pool, merge and rank
// the results, and persist the refreshed snapshot. A run in progress
// rejects a second run; connectivity loss cancels the sweep and keeps
// only completed results.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use medlink_api::{DEFAULT_PROBE_TIMEOUT, ProbeSuccess, Prober};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::announce::AnnouncementSource;
use super::{stats, sweep};
use crate::connectivity::{ConnectivityHandle, LinkType};
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, DiscoverySnapshot, TransportMode};
use crate::store::StateStore;

/// Tuning for discovery runs.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Per-probe timeout.
    pub probe_timeout: Duration,
    /// Maximum in-flight probes during a run.
    pub concurrency: usize,
    /// Ports probed on each sweep host.
    pub ports: Vec<u16>,
    /// Whether the subnet sweep source is enabled at all.
    pub sweep_enabled: bool,
    /// Sweep the whole /24 instead of hot + conventional ranges.
    pub full_range_sweep: bool,
    /// Local address override; auto-detected when `None`.
    pub local_ip: Option<Ipv4Addr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            concurrency: 48,
            ports: sweep::SWEEP_PORTS.to_vec(),
            sweep_enabled: true,
            full_range_sweep: false,
            local_ip: None,
        }
    }
}

/// Options for a single discovery run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverOptions {
    /// Event-triggered background run (quieter logging).
    pub background: bool,
    /// Keep previously known devices that were not re-verified this
    /// run instead of replacing the whole set.
    pub merge: bool,
}

/// Why the subnet sweep stage was skipped, if it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepSkipReason {
    /// Current link is not the expected local-segment type.
    NotWifi,
    /// Sweep disabled by configuration.
    Disabled,
    /// No local IPv4 address to derive the /24 from.
    NoLocalAddress,
}

/// Outcome of a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    /// Whether any device is in the merged set.
    pub success: bool,
    /// Merged device list, quality-descending.
    pub devices: Vec<DeviceDescriptor>,
    pub sweep_skipped: Option<SweepSkipReason>,
    /// True when the run was cut short by connectivity loss or
    /// shutdown; completed probes were still merged.
    pub cancelled: bool,
}

pub struct DiscoveryEngine {
    store: Arc<StateStore>,
    connectivity: ConnectivityHandle,
    announce: Arc<dyn AnnouncementSource>,
    prober: Prober,
    config: DiscoveryConfig,
    /// Held for the duration of a run; `try_lock` failure means a run
    /// is already in flight.
    in_progress: Mutex<()>,
    cancel: CancellationToken,
}

impl DiscoveryEngine {
    pub fn new(
        store: Arc<StateStore>,
        connectivity: ConnectivityHandle,
        announce: Arc<dyn AnnouncementSource>,
        config: DiscoveryConfig,
        cancel: CancellationToken,
    ) -> Result<Self, CoreError> {
        let prober = Prober::new(config.probe_timeout)
            .map_err(|e| CoreError::Internal(format!("probe client: {e}")))?;
        Ok(Self {
            store,
            connectivity,
            announce,
            prober,
            config,
            in_progress: Mutex::new(()),
            cancel,
        })
    }

    /// Run one discovery pass. See module docs for the pipeline.
    pub async fn discover(&self, options: DiscoverOptions) -> Result<DiscoveryReport, CoreError> {
        let Ok(_guard) = self.in_progress.try_lock() else {
            debug!("discovery already in progress -- rejecting overlapping run");
            return Err(CoreError::DiscoveryInProgress);
        };

        let conn = self.connectivity.current();
        if !conn.is_connected {
            return Err(CoreError::NoNetwork);
        }

        let previous = self.store.discovery_snapshot().await;
        let (candidates, sweep_skipped) = self.assemble_candidates(&previous, conn.link).await;

        if options.background {
            debug!(candidates = candidates.len(), "background discovery starting");
        } else {
            info!(candidates = candidates.len(), "discovery starting");
        }

        let (found, cancelled) = self.probe_all(candidates).await;
        let fresh = merge_fresh(found);

        // Merged set: fresh results win; with `merge`, unverified old
        // entries are carried over at their previous score.
        let mut devices = fresh.clone();
        if options.merge {
            for old in &previous.devices {
                if !devices.iter().any(|d| d.ip_address == old.ip_address) {
                    devices.push(old.clone());
                }
            }
        }
        sort_by_quality(&mut devices);

        let (preferred, preferred_pinned) = choose_preferred(&devices, &previous);

        let mut snapshot_stats = previous.stats.clone();
        snapshot_stats.record_run(fresh.len());
        snapshot_stats.common_ranges =
            stats::derive_common_ranges(&devices, &previous.stats.common_ranges);

        let snapshot = DiscoverySnapshot {
            devices: devices.clone(),
            preferred,
            preferred_pinned,
            stats: snapshot_stats,
            last_discovery: Some(Utc::now()),
        };
        self.store.apply_discovery(snapshot).await;

        self.apply_endpoint_transitions(preferred, &fresh, &devices);

        let success = !devices.is_empty();
        if options.background {
            debug!(found = fresh.len(), total = devices.len(), "discovery complete");
        } else {
            info!(found = fresh.len(), total = devices.len(), "discovery complete");
        }

        Ok(DiscoveryReport {
            success,
            devices,
            sweep_skipped,
            cancelled,
        })
    }

    /// Probe one address directly; on success return a fresh, scored
    /// descriptor. Used by manual device management and re-promotion.
    pub async fn verify_device(&self, ip: Ipv4Addr, port: u16) -> Option<DeviceDescriptor> {
        self.prober
            .probe(ip, port)
            .await
            .map(|p| DeviceDescriptor::from_probe(&p))
    }

    // ── Candidate assembly ───────────────────────────────────────────

    async fn assemble_candidates(
        &self,
        previous: &DiscoverySnapshot,
        link: LinkType,
    ) -> (Vec<(Ipv4Addr, u16)>, Option<SweepSkipReason>) {
        let mut candidates: Vec<(Ipv4Addr, u16)> = Vec::new();

        // (a) Known devices, preferred first.
        if let Some(preferred) = previous.preferred_device() {
            candidates.push((preferred.ip_address, preferred.port));
        }
        for device in &previous.devices {
            candidates.push((device.ip_address, device.port));
        }

        // (b) Local-segment announcements.
        candidates.extend(self.announce.lookup().await);

        // (c) Subnet sweep, when on the right kind of link.
        let sweep_skipped = if !self.config.sweep_enabled {
            Some(SweepSkipReason::Disabled)
        } else if link != LinkType::Wifi {
            debug!(?link, "not on WiFi -- re-verifying known devices only");
            Some(SweepSkipReason::NotWifi)
        } else {
            match self.config.local_ip.or_else(sweep::local_ipv4) {
                Some(local) => {
                    let hosts = sweep::candidate_hosts(
                        local,
                        &previous.stats.common_ranges,
                        self.config.full_range_sweep,
                    );
                    candidates.extend(sweep::candidate_endpoints(&hosts, &self.config.ports));
                    None
                }
                None => {
                    warn!("no local IPv4 address -- skipping subnet sweep");
                    Some(SweepSkipReason::NoLocalAddress)
                }
            }
        };

        // Dedupe, first occurrence wins, order preserved.
        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(*c));

        (candidates, sweep_skipped)
    }

    // ── Probe pool ───────────────────────────────────────────────────

    /// Probe all candidates with bounded concurrency. Completion order
    /// is nondeterministic, so results carry their candidate index for
    /// deterministic merging. Returns `(results, cancelled)`.
    async fn probe_all(
        &self,
        candidates: Vec<(Ipv4Addr, u16)>,
    ) -> (Vec<(usize, ProbeSuccess)>, bool) {
        let prober = self.prober.clone();
        let mut pool = stream::iter(candidates.into_iter().enumerate().map(
            move |(idx, (ip, port))| {
                let prober = prober.clone();
                async move { (idx, prober.probe(ip, port).await) }
            },
        ))
        .buffer_unordered(self.config.concurrency.max(1));

        let mut conn_rx = self.connectivity.subscribe();
        let mut observer_alive = true;
        let mut results = Vec::new();

        let cancelled = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("discovery cancelled by shutdown");
                    break true;
                }
                changed = conn_rx.changed(), if observer_alive => {
                    match changed {
                        Ok(()) => {
                            if !conn_rx.borrow().is_connected {
                                warn!("connectivity lost -- abandoning remaining probes");
                                break true;
                            }
                        }
                        // Observer gone; keep probing without it.
                        Err(_) => observer_alive = false,
                    }
                }
                next = pool.next() => match next {
                    Some((idx, Some(success))) => results.push((idx, success)),
                    Some((_, None)) => {}
                    None => break false,
                }
            }
        };

        (results, cancelled)
    }

    // ── Endpoint transitions ─────────────────────────────────────────

    /// Re-promote on fresh verification; push a dead Degraded endpoint
    /// down to cloud-only.
    fn apply_endpoint_transitions(
        &self,
        preferred: Option<Ipv4Addr>,
        fresh: &[DeviceDescriptor],
        merged: &[DeviceDescriptor],
    ) {
        let freshly_verified = preferred
            .and_then(|ip| fresh.iter().find(|d| d.ip_address == ip));

        if let Some(device) = freshly_verified {
            self.store.promote_edge(device);
            return;
        }

        match self.store.endpoint_state().transport {
            // Active edge device failed re-verification this run.
            TransportMode::EdgeActive if fresh.is_empty() => self.store.demote_edge(),
            // Already degraded and still nothing verified: give up on
            // the edge until something shows up again.
            TransportMode::Degraded if merged.is_empty() => self.store.mark_cloud_only(),
            _ => {}
        }
    }
}

// ── Pure merge helpers ───────────────────────────────────────────────

/// Deduplicate probe successes by address (first candidate order wins)
/// and score them into descriptors, quality-descending.
fn merge_fresh(mut found: Vec<(usize, ProbeSuccess)>) -> Vec<DeviceDescriptor> {
    found.sort_by_key(|(idx, _)| *idx);

    let mut seen = HashSet::new();
    let mut devices: Vec<DeviceDescriptor> = found
        .into_iter()
        .filter(|(_, p)| seen.insert(p.ip))
        .map(|(_, p)| DeviceDescriptor::from_probe(&p))
        .collect();
    sort_by_quality(&mut devices);
    devices
}

/// Stable quality-descending sort: ties keep first-discovered order.
fn sort_by_quality(devices: &mut [DeviceDescriptor]) {
    devices.sort_by(|a, b| b.quality.partial_cmp(&a.quality).unwrap_or(Ordering::Equal));
}

/// Preferred-device policy: a pinned choice survives as long as it is
/// still present; an automatic choice always tracks the current
/// maximum-quality device.
fn choose_preferred(
    devices: &[DeviceDescriptor],
    previous: &DiscoverySnapshot,
) -> (Option<Ipv4Addr>, bool) {
    if previous.preferred_pinned {
        if let Some(ip) = previous.preferred {
            if devices.iter().any(|d| d.ip_address == ip) {
                return (Some(ip), true);
            }
        }
        // Pinned device vanished; fall through to automatic choice.
    }
    (devices.first().map(|d| d.ip_address), false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::Capabilities;
    use chrono::Utc;

    fn descriptor(last_octet: u8, quality: f64) -> DeviceDescriptor {
        DeviceDescriptor {
            ip_address: Ipv4Addr::new(10, 0, 0, last_octet),
            port: 3000,
            name: format!("edge-{last_octet}"),
            version: None,
            capabilities: Capabilities::default(),
            response_time_ms: 100,
            quality,
            last_seen: Utc::now(),
        }
    }

    fn snapshot_with(devices: Vec<DeviceDescriptor>, preferred: Option<u8>, pinned: bool) -> DiscoverySnapshot {
        DiscoverySnapshot {
            devices,
            preferred: preferred.map(|o| Ipv4Addr::new(10, 0, 0, o)),
            preferred_pinned: pinned,
            ..DiscoverySnapshot::default()
        }
    }

    #[test]
    fn automatic_preferred_tracks_max_quality() {
        let devices = vec![descriptor(9, 0.89), descriptor(3, 0.65)];
        let previous = snapshot_with(vec![descriptor(3, 0.65)], Some(3), false);

        let (preferred, pinned) = choose_preferred(&devices, &previous);
        assert_eq!(preferred, Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert!(!pinned);
    }

    #[test]
    fn pinned_preferred_survives_being_outscored() {
        let devices = vec![descriptor(9, 0.89), descriptor(3, 0.65)];
        let previous = snapshot_with(devices.clone(), Some(3), true);

        let (preferred, pinned) = choose_preferred(&devices, &previous);
        assert_eq!(preferred, Some(Ipv4Addr::new(10, 0, 0, 3)));
        assert!(pinned);
    }

    #[test]
    fn vanished_pin_falls_back_to_automatic() {
        let devices = vec![descriptor(9, 0.89)];
        let previous = snapshot_with(vec![descriptor(3, 0.65)], Some(3), true);

        let (preferred, pinned) = choose_preferred(&devices, &previous);
        assert_eq!(preferred, Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert!(!pinned);
    }

    #[test]
    fn empty_set_clears_preferred() {
        let previous = snapshot_with(vec![descriptor(3, 0.65)], Some(3), false);
        let (preferred, pinned) = choose_preferred(&[], &previous);
        assert_eq!(preferred, None);
        assert!(!pinned);
    }

    #[test]
    fn merge_dedupes_by_address_first_candidate_wins() {
        use medlink_api::{HealthResponse, ProbeSuccess};
        use std::collections::HashMap;

        let probe = |idx: usize, octet: u8, port: u16, elapsed_ms: u64| {
            (
                idx,
                ProbeSuccess {
                    ip: Ipv4Addr::new(10, 0, 0, octet),
                    port,
                    health: HealthResponse {
                        status: "ok".into(),
                        service: Some("medlink-edge".into()),
                        name: None,
                        version: None,
                        capabilities: HashMap::new(),
                        last_sync: None,
                    },
                    elapsed_ms,
                },
            )
        };

        // Same host answered on two ports; completion order reversed.
        let found = vec![probe(2, 7, 8080, 400), probe(0, 7, 3000, 90), probe(1, 9, 3000, 90)];
        let devices = merge_fresh(found);

        assert_eq!(devices.len(), 2);
        // The earlier candidate (port 3000, faster) won the dedupe.
        let seven = devices
            .iter()
            .find(|d| d.ip_address == Ipv4Addr::new(10, 0, 0, 7))
            .expect("device 7");
        assert_eq!(seven.port, 3000);
        assert_eq!(seven.response_time_ms, 90);
    }

    #[test]
    fn quality_sort_is_stable_for_ties() {
        let mut devices = vec![
            descriptor(1, 0.7),
            descriptor(2, 0.9),
            descriptor(3, 0.7),
        ];
        sort_by_quality(&mut devices);
        let octets: Vec<u8> = devices.iter().map(|d| d.ip_address.octets()[3]).collect();
        assert_eq!(octets, vec![2, 1, 3]);
    }
}
