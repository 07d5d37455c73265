// ── Endpoint selection and the translate fallback chain ──
//
// Cache first, then edge -> cloud -> local offline, demoting the edge
// transport on its first runtime failure. Only exhaustion of the whole
// chain surfaces an error; while offline, failed requests are queued
// for the sync reconciler before the error reaches the caller.

use std::sync::Arc;

use async_trait::async_trait;
use medlink_api::{TranslationClient, TransportConfig};
use tracing::{debug, warn};
use url::Url;

use crate::connectivity::ConnectivityHandle;
use crate::error::CoreError;
use crate::model::{
    CacheKey, OfflineQueueItem, ResultSource, TranslationJob, TranslationResult, TransportMode,
};
use crate::store::StateStore;

/// Local lower-fidelity translator collaborator, used when no network
/// path is available (or every network path failed).
#[async_trait]
pub trait OfflineTranslator: Send + Sync {
    /// Whether a local model exists for the language pair.
    fn has_model(&self, source: &str, target: &str) -> bool;

    async fn translate(&self, job: &TranslationJob) -> Result<TranslationResult, CoreError>;
}

/// No local models installed. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOfflineTranslator;

#[async_trait]
impl OfflineTranslator for NoOfflineTranslator {
    fn has_model(&self, _source: &str, _target: &str) -> bool {
        false
    }

    async fn translate(&self, job: &TranslationJob) -> Result<TranslationResult, CoreError> {
        let (source, target) = job.language_pair();
        Err(CoreError::NoOfflineModel {
            source: source.to_owned(),
            target: target.to_owned(),
        })
    }
}

/// Routes translate calls to the best live transport.
pub struct EndpointSelector {
    store: Arc<StateStore>,
    connectivity: ConnectivityHandle,
    offline: Arc<dyn OfflineTranslator>,
    cloud: TranslationClient,
}

impl EndpointSelector {
    pub fn new(
        store: Arc<StateStore>,
        connectivity: ConnectivityHandle,
        offline: Arc<dyn OfflineTranslator>,
        transport: &TransportConfig,
    ) -> Result<Self, CoreError> {
        let cloud = TranslationClient::new(store.cloud_url().clone(), transport)
            .map_err(|e| CoreError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            store,
            connectivity,
            offline,
            cloud,
        })
    }

    /// Translate through the fallback chain. Every success lands in
    /// the cache before it is returned.
    pub async fn translate(&self, job: TranslationJob) -> Result<TranslationResult, CoreError> {
        let key = job.cache_key();
        if let Some(hit) = self.store.cache_get(&key).await {
            debug!("translation served from cache");
            return Ok(hit.as_cached());
        }

        if !self.connectivity.is_connected() {
            return self.translate_offline(job, &key).await;
        }

        // Edge first while an edge device is active.
        let state = self.store.endpoint_state();
        if state.is_edge && state.transport == TransportMode::EdgeActive {
            match self.call(&state.endpoint, &job, ResultSource::Edge).await {
                Ok(result) => {
                    self.store.cache_put(&key, result.clone()).await;
                    return Ok(result);
                }
                Err(e) => {
                    warn!(error = %e, "edge translate failed -- demoting to cloud");
                    self.store.demote_edge();
                }
            }
        }

        // Cloud, either directly or as the retry after demotion.
        match self.call_cloud(&job).await {
            Ok(result) => {
                self.store.cache_put(&key, result.clone()).await;
                Ok(result)
            }
            Err(e) => {
                let (source, target) = job.language_pair();
                if self.offline.has_model(source, target) {
                    debug!(error = %e, "cloud translate failed -- using local model");
                    let result = self.offline.translate(&job).await?;
                    self.store.cache_put(&key, result.clone()).await;
                    return Ok(result);
                }
                Err(CoreError::from(e))
            }
        }
    }

    /// No-network path: local model or queue-and-fail.
    async fn translate_offline(
        &self,
        job: TranslationJob,
        key: &CacheKey,
    ) -> Result<TranslationResult, CoreError> {
        let (source, target) = job.language_pair();

        if self.offline.has_model(source, target) {
            match self.offline.translate(&job).await {
                Ok(result) => {
                    self.store.cache_put(key, result.clone()).await;
                    return Ok(result);
                }
                Err(e) => {
                    warn!(error = %e, "local translation failed while offline");
                    self.store.enqueue_offline(OfflineQueueItem::new(job)).await;
                    return Err(e);
                }
            }
        }

        let err = CoreError::NoOfflineModel {
            source: source.to_owned(),
            target: target.to_owned(),
        };
        debug!(%err, "queueing request for later sync");
        self.store.enqueue_offline(OfflineQueueItem::new(job)).await;
        Err(err)
    }

    /// Replay one job against the cloud endpoint (used by the sync
    /// reconciler; bypasses cache and fallback).
    pub(crate) async fn replay_to_cloud(
        &self,
        job: &TranslationJob,
    ) -> Result<TranslationResult, CoreError> {
        self.call_cloud(job).await.map_err(CoreError::from)
    }

    async fn call_cloud(&self, job: &TranslationJob) -> Result<TranslationResult, medlink_api::Error> {
        dispatch(&self.cloud, job, ResultSource::Cloud).await
    }

    async fn call(
        &self,
        base: &Url,
        job: &TranslationJob,
        source: ResultSource,
    ) -> Result<TranslationResult, medlink_api::Error> {
        let client = self.cloud.rebind(base);
        dispatch(&client, job, source).await
    }
}

/// Send a job to a client's matching endpoint.
async fn dispatch(
    client: &TranslationClient,
    job: &TranslationJob,
    source: ResultSource,
) -> Result<TranslationResult, medlink_api::Error> {
    let resp = if job.is_audio() {
        let req = job.as_audio_request().expect("audio job has an audio request");
        client.translate_audio(&req).await?
    } else {
        let req = job.as_text_request().expect("text job has a text request");
        client.translate_text(&req).await?
    };
    Ok(TranslationResult::from_response(resp, source))
}
