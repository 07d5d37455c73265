//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use medlink_core::CoreError;

/// Exit codes for scripting.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const BUSY: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("No network connectivity")]
    #[diagnostic(
        code(medlink::no_network),
        help("Discovery and sync need a live network connection.")
    )]
    NoNetwork,

    #[error("A discovery run is already in progress")]
    #[diagnostic(
        code(medlink::discovery_busy),
        help("Wait for the current run to finish and try again.")
    )]
    DiscoveryBusy,

    #[error("No offline model for {source} -> {target}")]
    #[diagnostic(
        code(medlink::no_offline_model),
        help(
            "The request was queued and will sync automatically once\n\
             connectivity returns."
        )
    )]
    NoOfflineModel { r#source: String, target: String },

    #[error("Device '{ip}' not found")]
    #[diagnostic(
        code(medlink::device_not_found),
        help("Run `medlink discover` to refresh the device list.")
    )]
    DeviceNotFound { ip: String },

    #[error("No edge device answered at {ip}:{port}")]
    #[diagnostic(
        code(medlink::probe_negative),
        help("Check the address and that the edge service is running.")
    )]
    ProbeNegative { ip: String, port: u16 },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(medlink::config))]
    Config { message: String },

    #[error("{0}")]
    #[diagnostic(code(medlink::engine))]
    Engine(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoNetwork => exit_code::CONNECTION,
            Self::DiscoveryBusy => exit_code::BUSY,
            Self::NoOfflineModel { .. }
            | Self::DeviceNotFound { .. }
            | Self::ProbeNegative { .. } => exit_code::NOT_FOUND,
            Self::Config { .. } => exit_code::USAGE,
            Self::Engine(_) => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoNetwork => Self::NoNetwork,
            CoreError::DiscoveryInProgress => Self::DiscoveryBusy,
            CoreError::NoOfflineModel { source, target } => {
                Self::NoOfflineModel { source, target }
            }
            CoreError::DeviceNotFound { ip } => Self::DeviceNotFound { ip },
            CoreError::Config { message } => Self::Config { message },
            other => Self::Engine(other.to_string()),
        }
    }
}

impl From<medlink_config::ConfigError> for CliError {
    fn from(err: medlink_config::ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}
