// Shared transport configuration for building reqwest::Client instances.
//
// The prober and both translate clients (edge, cloud) share timeout
// settings through this module, avoiding duplicated builder logic.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Overall request timeout.
    pub timeout: Duration,
    /// TCP connect timeout. Kept tighter than `timeout` so a dead host
    /// on the local segment fails fast during a subnet sweep.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    /// A config tuned for health probing: both timeouts capped at the
    /// per-probe budget.
    pub fn for_probing(probe_timeout: Duration) -> Self {
        Self {
            timeout: probe_timeout,
            connect_timeout: probe_timeout,
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent("medlink-client/0.1.0")
            .build()
            .map_err(crate::error::Error::Transport)
    }
}
