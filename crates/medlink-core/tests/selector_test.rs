// Fallback-chain tests for the endpoint selector: cache first, then
// edge -> cloud -> local offline, queueing failures made while
// disconnected.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medlink_core::connectivity::{self, ConnectivityState};
use medlink_core::{
    Capabilities, CoreError, DeviceDescriptor, DiscoverySnapshot, EdgeRuntime, MemoryStore,
    NoAnnouncement, OfflineTranslator, ResultSource, RuntimeConfig, TranslationJob,
    TranslationResult, TransportMode,
};

fn job(text: &str) -> TranslationJob {
    TranslationJob::text(text, "en", "es", None)
}

fn translate_response() -> serde_json::Value {
    json!({
        "originalText": "chest pain",
        "translatedText": "dolor de pecho",
        "confidence": 0.95,
        "processingTime": 0.08,
    })
}

fn config_with_cloud(cloud_uri: &str) -> RuntimeConfig {
    RuntimeConfig {
        cloud_url: cloud_uri.parse().expect("cloud url"),
        ..RuntimeConfig::default()
    }
}

async fn cloud_runtime(state: ConnectivityState) -> (MockServer, EdgeRuntime) {
    let cloud = MockServer::start().await;
    let (_tx, handle) = connectivity::channel(state);
    let rt = EdgeRuntime::with_defaults(
        config_with_cloud(&cloud.uri()),
        Arc::new(MemoryStore::new()),
        handle,
    )
    .await
    .expect("runtime");
    (cloud, rt)
}

fn dead_device() -> DeviceDescriptor {
    // Nothing listens on this port.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    DeviceDescriptor {
        ip_address: Ipv4Addr::new(127, 0, 0, 1),
        port,
        name: "dead edge".into(),
        version: None,
        capabilities: Capabilities::default(),
        response_time_ms: 60,
        quality: 0.8,
        last_seen: Utc::now(),
    }
}

// ── Cloud-only path ─────────────────────────────────────────────────

#[tokio::test]
async fn cloud_translate_populates_cache() {
    let (cloud, rt) = cloud_runtime(ConnectivityState::online_wifi()).await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translate_response()))
        .expect(1) // the second call must come from the cache
        .mount(&cloud)
        .await;

    let first = rt.translate(job("chest pain")).await.expect("first call");
    assert_eq!(first.source, ResultSource::Cloud);
    assert_eq!(first.translated_text.as_deref(), Some("dolor de pecho"));

    let second = rt.translate(job("chest pain")).await.expect("second call");
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(second.translated_text.as_deref(), Some("dolor de pecho"));
}

// ── Edge failover ───────────────────────────────────────────────────

#[tokio::test]
async fn edge_failure_demotes_and_retries_cloud() {
    let (cloud, rt) = cloud_runtime(ConnectivityState::online_wifi()).await;

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translate_response()))
        .mount(&cloud)
        .await;

    // Seed an active edge device that is no longer reachable.
    let device = dead_device();
    rt.store()
        .apply_discovery(DiscoverySnapshot {
            devices: vec![device.clone()],
            preferred: Some(device.ip_address),
            preferred_pinned: false,
            ..DiscoverySnapshot::default()
        })
        .await;
    rt.store().promote_edge(&device);
    assert_eq!(rt.endpoint_state().transport, TransportMode::EdgeActive);

    // The call still succeeds -- served by the cloud retry.
    let result = rt.translate(job("chest pain")).await.expect("translate");
    assert_eq!(result.source, ResultSource::Cloud);

    // And the transport was demoted, persistently for this process.
    let state = rt.endpoint_state();
    assert_eq!(state.transport, TransportMode::Degraded);
    assert!(!state.is_edge);
}

// ── Offline paths ───────────────────────────────────────────────────

#[tokio::test]
async fn offline_without_model_queues_and_fails() {
    let (_cloud, rt) = cloud_runtime(ConnectivityState::offline()).await;

    let result = rt.translate(job("chest pain")).await;
    match result {
        Err(CoreError::NoOfflineModel { source, target }) => {
            assert_eq!(source, "en");
            assert_eq!(target, "es");
        }
        other => panic!("expected NoOfflineModel, got: {other:?}"),
    }

    // The request was queued before the error surfaced.
    assert_eq!(rt.store().queue_len().await, 1);
}

struct SpanishModel;

#[async_trait]
impl OfflineTranslator for SpanishModel {
    fn has_model(&self, source: &str, target: &str) -> bool {
        source == "en" && target == "es"
    }

    async fn translate(&self, job: &TranslationJob) -> Result<TranslationResult, CoreError> {
        let _ = job;
        Ok(TranslationResult {
            translated_text: Some("dolor de pecho (local)".into()),
            transcribed_text: None,
            audio_response: None,
            confidence: Some(0.7),
            processing_time: None,
            source: ResultSource::Offline,
        })
    }
}

#[tokio::test]
async fn offline_with_model_translates_locally() {
    let (_tx, handle) = connectivity::channel(ConnectivityState::offline());
    let rt = EdgeRuntime::new(
        RuntimeConfig::default(),
        Arc::new(MemoryStore::new()),
        handle,
        Arc::new(SpanishModel),
        Arc::new(NoAnnouncement),
    )
    .await
    .expect("runtime");

    let result = rt.translate(job("chest pain")).await.expect("local translate");
    assert_eq!(result.source, ResultSource::Offline);
    assert_eq!(
        result.translated_text.as_deref(),
        Some("dolor de pecho (local)")
    );

    // Nothing queued; local success is a success.
    assert_eq!(rt.store().queue_len().await, 0);

    // Unsupported pair still fails and queues.
    let unsupported = TranslationJob::text("bonjour", "fr", "de", None);
    assert!(matches!(
        rt.translate(unsupported).await,
        Err(CoreError::NoOfflineModel { .. })
    ));
    assert_eq!(rt.store().queue_len().await, 1);
}

#[tokio::test]
async fn cache_hits_work_even_offline() {
    let cloud = MockServer::start().await;
    let (tx, handle) = connectivity::channel(ConnectivityState::online_wifi());
    let rt = EdgeRuntime::with_defaults(
        config_with_cloud(&cloud.uri()),
        Arc::new(MemoryStore::new()),
        handle,
    )
    .await
    .expect("runtime");

    Mock::given(method("POST"))
        .and(path("/translate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(translate_response()))
        .mount(&cloud)
        .await;

    rt.translate(job("chest pain")).await.expect("online call");

    // Drop the network; the identical request is served from cache
    // instead of being queued.
    tx.send(ConnectivityState::offline()).ok();
    let result = rt.translate(job("chest pain")).await.expect("cached call");
    assert_eq!(result.source, ResultSource::Cache);
    assert_eq!(rt.store().queue_len().await, 0);
}
