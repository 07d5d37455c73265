//! Shared configuration for MedLink client tools.
//!
//! TOML config with environment overrides, resolved through XDG
//! platform conventions, and translation to `medlink_core`'s runtime
//! config types. The core crate never reads config files itself.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use medlink_api::TransportConfig;
use medlink_core::{DiscoveryConfig, RuntimeConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cloud: CloudSection,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub sweep: SweepSection,

    #[serde(default)]
    pub storage: StorageSection,
}

/// Cloud translation API settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct CloudSection {
    /// Cloud API base URL.
    #[serde(default = "default_cloud_url")]
    pub url: String,

    /// Request timeout in seconds for translate traffic.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for CloudSection {
    fn default() -> Self {
        Self {
            url: default_cloud_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_cloud_url() -> String {
    "https://api.medtranslate.ai/".into()
}
fn default_timeout() -> u64 {
    30
}

/// Discovery probing settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct DiscoverySection {
    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Maximum in-flight probes.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Ports probed per sweep host.
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    /// Periodic rediscovery interval in seconds. 0 = event-driven only.
    #[serde(default)]
    pub interval_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            concurrency: default_concurrency(),
            ports: default_ports(),
            interval_secs: 0,
        }
    }
}

fn default_probe_timeout_ms() -> u64 {
    2000
}
fn default_concurrency() -> usize {
    48
}
fn default_ports() -> Vec<u16> {
    medlink_core::discovery::sweep::SWEEP_PORTS.to_vec()
}

/// Subnet sweep settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct SweepSection {
    /// Whether the subnet sweep source runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sweep the full /24 instead of hot + conventional ranges.
    #[serde(default)]
    pub full_range: bool,

    /// Local address override; auto-detected when unset.
    pub local_ip: Option<String>,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            enabled: true,
            full_range: false,
            local_ip: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Durable state storage settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageSection {
    /// Path of the state file; platform data dir when unset.
    pub path: Option<PathBuf>,
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "medlink", "medlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Resolve the durable state file path.
pub fn state_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.storage.path {
        return path.clone();
    }
    ProjectDirs::from("dev", "medlink", "medlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("state.json");
            p
        },
        |dirs| dirs.data_dir().join("state.json"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("medlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("MEDLINK_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning defaults if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Translation to core types ───────────────────────────────────────

/// Build a [`RuntimeConfig`] from the loaded config.
pub fn to_runtime_config(config: &Config) -> Result<RuntimeConfig, ConfigError> {
    let cloud_url: url::Url =
        config
            .cloud
            .url
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "cloud.url".into(),
                reason: format!("invalid URL: {}", config.cloud.url),
            })?;

    let local_ip: Option<Ipv4Addr> = match config.sweep.local_ip {
        Some(ref raw) => Some(raw.parse().map_err(|_| ConfigError::Validation {
            field: "sweep.local_ip".into(),
            reason: format!("invalid IPv4 address: {raw}"),
        })?),
        None => None,
    };

    Ok(RuntimeConfig {
        cloud_url,
        transport: TransportConfig {
            timeout: Duration::from_secs(config.cloud.timeout),
            ..TransportConfig::default()
        },
        discovery: DiscoveryConfig {
            probe_timeout: Duration::from_millis(config.discovery.probe_timeout_ms),
            concurrency: config.discovery.concurrency,
            ports: config.discovery.ports.clone(),
            sweep_enabled: config.sweep.enabled,
            full_range_sweep: config.sweep.full_range,
            local_ip,
        },
        rediscovery_interval_secs: config.discovery.interval_secs,
    })
}
