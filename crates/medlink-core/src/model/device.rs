// ── Device domain types ──

use std::collections::HashMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use medlink_api::ProbeSuccess;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::score;

/// Feature flags an edge device advertises from `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    #[serde(default)]
    pub offline_translation: bool,
    #[serde(default)]
    pub audio_processing: bool,
    #[serde(default)]
    pub high_performance: bool,
    #[serde(default)]
    pub low_latency: bool,
}

impl Capabilities {
    /// Build from the raw flag map in a health response. Unknown flags
    /// are ignored; absent flags are false.
    pub fn from_flags(flags: &HashMap<String, bool>) -> Self {
        let on = |name: &str| flags.get(name).copied().unwrap_or(false);
        Self {
            offline_translation: on("offlineTranslation"),
            audio_processing: on("audioProcessing"),
            high_performance: on("highPerformance"),
            low_latency: on("lowLatency"),
        }
    }
}

/// One discovered edge-device candidate.
///
/// Unique by `ip_address` within any discovered set. Refreshed
/// wholesale on every successful re-probe of the same address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub ip_address: Ipv4Addr,
    pub port: u16,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    pub response_time_ms: u64,
    /// Combined quality score in [0,1]; see [`crate::score`].
    pub quality: f64,
    pub last_seen: DateTime<Utc>,
}

impl DeviceDescriptor {
    /// Build a descriptor from a successful probe, computing the
    /// quality score from the measured latency and reported metadata.
    pub fn from_probe(probe: &ProbeSuccess) -> Self {
        let capabilities = Capabilities::from_flags(&probe.health.capabilities);
        let version = probe.health.version.clone();
        let quality = score::quality(probe.elapsed_ms, &capabilities, version.as_deref());
        let name = probe
            .health
            .name
            .clone()
            .unwrap_or_else(|| format!("MedLink Edge ({})", probe.ip));

        Self {
            ip_address: probe.ip,
            port: probe.port,
            name,
            version,
            capabilities,
            response_time_ms: probe.elapsed_ms,
            quality,
            last_seen: Utc::now(),
        }
    }

    /// Base URL for this device's translate API.
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}:{}/", self.ip_address, self.port))
            .expect("device address always forms a valid URL")
    }
}
