// Wire models for the edge and cloud translate APIs.
//
// Both services speak camelCase JSON. Fields use `#[serde(default)]`
// liberally because edge firmware versions differ in which optional
// fields they report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Service identifier an edge device must report from `/health` to be
/// accepted as a translation appliance.
pub const EDGE_SERVICE_ID: &str = "medlink-edge";

// ── Health check ─────────────────────────────────────────────────────

/// Body of a `GET /health` response.
///
/// ```json
/// { "status": "ok", "service": "medlink-edge", "version": "1.0.0",
///   "capabilities": { "offlineTranslation": true } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub capabilities: HashMap<String, bool>,
    /// Last model sync reported by the device, if any.
    #[serde(default)]
    pub last_sync: Option<String>,
}

impl HealthResponse {
    /// Whether this body self-identifies as a MedLink edge service.
    ///
    /// Anything else listening on the probed port (printers, NAS web
    /// UIs, other dev servers) fails this check and is discarded.
    pub fn is_edge_service(&self) -> bool {
        self.status == "ok" && self.service.as_deref() == Some(EDGE_SERVICE_ID)
    }
}

// ── Translate requests ───────────────────────────────────────────────

/// `POST /translate` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslateTextRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    /// Medical context hint (e.g. "cardiology"). Defaults to "general".
    #[serde(default = "default_context")]
    pub context: String,
}

/// `POST /translate/audio` request body. `audio_data` is base64.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslateAudioRequest {
    pub audio_data: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default = "default_context")]
    pub context: String,
}

fn default_context() -> String {
    "general".into()
}

// ── Translate responses ──────────────────────────────────────────────

/// Response from either translate endpoint.
///
/// Text translations populate `translated_text`; audio translations
/// may additionally carry `transcribed_text` and a synthesized
/// `audio_response` (base64).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResponse {
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub transcribed_text: Option<String>,
    #[serde(default)]
    pub audio_response: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// End-to-end processing time reported by the service, in seconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
}

/// Error body returned by both services on 4xx/5xx.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
