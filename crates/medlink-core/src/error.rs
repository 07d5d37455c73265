// ── Core error types ──
//
// User-facing errors from medlink-core. These are NOT transport-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<medlink_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Preconditions ────────────────────────────────────────────────
    #[error("No network connectivity")]
    NoNetwork,

    #[error("A discovery run is already in progress")]
    DiscoveryInProgress,

    // ── Translation errors ───────────────────────────────────────────
    #[error("No offline model available for {source} -> {target}")]
    NoOfflineModel { r#source: String, target: String },

    #[error("Translation failed: {message}")]
    TranslationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {ip}")]
    DeviceNotFound { ip: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether retrying the same request against another transport
    /// could still succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoNetwork | Self::TranslationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<medlink_api::Error> for CoreError {
    fn from(err: medlink_api::Error) -> Self {
        match err {
            medlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            medlink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            other => CoreError::TranslationFailed {
                message: other.to_string(),
            },
        }
    }
}

impl From<crate::persist::PersistError> for CoreError {
    fn from(err: crate::persist::PersistError) -> Self {
        CoreError::Persistence {
            message: err.to_string(),
        }
    }
}
