// Endpoint prober
//
// Issues a single bounded-time health check against one address/port
// pair. A probe has exactly two outcomes: a device descriptor's raw
// material, or nothing. Timeouts, refused connections, and bodies that
// fail to self-identify are all the same negative result -- never an
// error, since most probed addresses have nothing listening.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::HealthResponse;
use crate::transport::TransportConfig;

/// Default budget for a single health check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

/// A successful probe: the health body plus the measured round trip.
#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub health: HealthResponse,
    /// End-to-end request latency, request sent to body parsed.
    pub elapsed_ms: u64,
}

/// Health prober for candidate edge devices.
///
/// One `Prober` is shared across a whole discovery run; the underlying
/// `reqwest::Client` pools connections and enforces the per-probe
/// timeout on every request.
#[derive(Clone)]
pub struct Prober {
    http: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    /// Create a prober with the given per-probe timeout.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let http = TransportConfig::for_probing(timeout).build_client()?;
        Ok(Self { http, timeout })
    }

    /// Create a prober with the default 2s timeout.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }

    /// The per-probe timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Health-check one candidate. `None` means "nothing usable here":
    /// timeout, refused connection, non-200, unparsable body, or a
    /// service that is not a MedLink edge device.
    pub async fn probe(&self, ip: Ipv4Addr, port: u16) -> Option<ProbeSuccess> {
        let url = match Url::parse(&format!("http://{ip}:{port}/health")) {
            Ok(u) => u,
            Err(e) => {
                debug!(%ip, port, error = %e, "unbuildable probe URL");
                return None;
            }
        };

        let started = Instant::now();

        let resp = match self.http.get(url).timeout(self.timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                trace!(%ip, port, error = %e, "probe negative (transport)");
                return None;
            }
        };

        if !resp.status().is_success() {
            trace!(%ip, port, status = %resp.status(), "probe negative (status)");
            return None;
        }

        let health: HealthResponse = match resp.json().await {
            Ok(h) => h,
            Err(e) => {
                trace!(%ip, port, error = %e, "probe negative (body)");
                return None;
            }
        };

        if !health.is_edge_service() {
            trace!(%ip, port, "probe negative (not an edge service)");
            return None;
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(%ip, port, elapsed_ms, "edge device responded");

        Some(ProbeSuccess {
            ip,
            port,
            health,
            elapsed_ms,
        })
    }
}
