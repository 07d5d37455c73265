// Translate API HTTP client
//
// Wraps `reqwest::Client` with MedLink-specific URL construction and
// error-body unwrapping. The same client type serves both transports:
// an edge instance is bound to `http://{device}:{port}`, a cloud
// instance to the configured API base URL.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    ApiErrorBody, TranslateAudioRequest, TranslateTextRequest, TranslationResponse,
};
use crate::transport::TransportConfig;

/// HTTP client for a single translate endpoint (edge device or cloud).
#[derive(Clone)]
pub struct TranslationClient {
    http: reqwest::Client,
    base_url: Url,
}

impl TranslationClient {
    /// Create a client bound to `base_url` using a fresh HTTP client.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client from a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self { http, base_url })
    }

    /// The endpoint this client targets.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// A client sharing this one's connection pool, bound to a
    /// different base URL. Used to follow the active endpoint as it
    /// moves between edge devices and the cloud.
    pub fn rebind(&self, base_url: &Url) -> Self {
        Self {
            http: self.http.clone(),
            base_url: base_url.clone(),
        }
    }

    /// `POST /translate`
    pub async fn translate_text(
        &self,
        req: &TranslateTextRequest,
    ) -> Result<TranslationResponse, Error> {
        let url = self.endpoint("translate")?;
        debug!(%url, source = %req.source_language, target = %req.target_language, "translate text");
        self.post(url, req).await
    }

    /// `POST /translate/audio`
    pub async fn translate_audio(
        &self,
        req: &TranslateAudioRequest,
    ) -> Result<TranslationResponse, Error> {
        let url = self.endpoint("translate/audio")?;
        debug!(%url, source = %req.source_language, target = %req.target_language, "translate audio");
        self.post(url, req).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    /// Send a POST with a JSON body; unwrap `{error}` on failure.
    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::Api {
                message,
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text,
        })
    }
}
