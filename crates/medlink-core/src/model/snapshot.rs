// ── Discovery snapshot and endpoint state ──

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::device::DeviceDescriptor;

/// An inclusive range of last-octet values worth probing early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OctetRange {
    pub start: u8,
    pub end: u8,
}

impl OctetRange {
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        usize::from(self.end.saturating_sub(self.start)) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, octet: u8) -> bool {
        (self.start..=self.end).contains(&octet)
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u8> {
        self.start..=self.end
    }
}

/// Aggregate discovery statistics, persisted across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryStats {
    /// Total discovery runs attempted.
    pub attempts: u64,
    /// Runs that found at least one device.
    pub successes: u64,
    /// Running average of devices found per run.
    pub avg_devices_found: f64,
    /// Top "hot" last-octet ranges, probed first on the next sweep.
    #[serde(default)]
    pub common_ranges: Vec<OctetRange>,
}

/// The discovery engine's full persisted state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySnapshot {
    /// Discovered devices, sorted by quality descending.
    pub devices: Vec<DeviceDescriptor>,
    /// Address of the preferred device, if any. Must reference a
    /// member of `devices`.
    pub preferred: Option<Ipv4Addr>,
    /// Whether `preferred` was pinned by an explicit user override.
    /// A pinned device survives re-ranking even when outscored.
    #[serde(default)]
    pub preferred_pinned: bool,
    pub stats: DiscoveryStats,
    pub last_discovery: Option<DateTime<Utc>>,
}

impl DiscoverySnapshot {
    /// The preferred device's descriptor, if one is set and present.
    pub fn preferred_device(&self) -> Option<&DeviceDescriptor> {
        let ip = self.preferred?;
        self.device(ip)
    }

    pub fn device(&self, ip: Ipv4Addr) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.ip_address == ip)
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.device(ip).is_some()
    }
}

/// Which transport active traffic is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
pub enum TransportMode {
    /// No edge device configured; all traffic goes to the cloud.
    #[strum(serialize = "cloud-only")]
    CloudOnly,
    /// An edge device is the active endpoint.
    #[strum(serialize = "edge-active")]
    EdgeActive,
    /// An edge device is configured but failed at runtime; traffic is
    /// on the cloud until a fresh probe or discovery re-promotes it.
    #[strum(serialize = "degraded")]
    Degraded,
}

/// Process-wide endpoint selection state. Not persisted across full
/// resets -- rebuilt at startup from the persisted preferred device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointState {
    pub transport: TransportMode,
    /// Base URL of the endpoint currently receiving traffic.
    pub endpoint: Url,
    /// Whether `endpoint` is a LAN edge device (vs. the cloud API).
    pub is_edge: bool,
}

impl EndpointState {
    pub fn cloud_only(cloud_url: Url) -> Self {
        Self {
            transport: TransportMode::CloudOnly,
            endpoint: cloud_url,
            is_edge: false,
        }
    }

    pub fn edge_active(device: &DeviceDescriptor) -> Self {
        Self {
            transport: TransportMode::EdgeActive,
            endpoint: device.base_url(),
            is_edge: true,
        }
    }
}
