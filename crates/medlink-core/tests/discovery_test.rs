// End-to-end discovery tests: a wiremock "edge device" on loopback is
// found by the subnet sweep, ranked, persisted, and promoted.

use std::net::Ipv4Addr;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medlink_core::connectivity::{self, ConnectivityState, LinkType};
use medlink_core::{
    CoreError, DiscoverOptions, DiscoveryConfig, EdgeRuntime, MemoryStore, RuntimeConfig,
    SweepSkipReason, TransportMode,
};

const LOCALHOST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

async fn edge_device_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "service": "medlink-edge",
            "name": "Ward 3 Edge",
            "version": "1.4.0",
            "capabilities": { "offlineTranslation": true, "audioProcessing": true },
        })))
        .mount(&server)
        .await;
    server
}

fn runtime_config(edge_port: u16) -> RuntimeConfig {
    RuntimeConfig {
        discovery: DiscoveryConfig {
            ports: vec![edge_port],
            local_ip: Some(LOCALHOST),
            ..DiscoveryConfig::default()
        },
        ..RuntimeConfig::default()
    }
}

async fn runtime(edge_port: u16, state: ConnectivityState) -> EdgeRuntime {
    // The sender is dropped; the handle keeps serving the last state.
    let (_tx, handle) = connectivity::channel(state);
    EdgeRuntime::with_defaults(runtime_config(edge_port), Arc::new(MemoryStore::new()), handle)
        .await
        .expect("runtime")
}

#[tokio::test]
async fn sweep_finds_and_promotes_edge_device() {
    let server = edge_device_server().await;
    let rt = runtime(server.address().port(), ConnectivityState::online_wifi()).await;

    let report = rt
        .discover(DiscoverOptions::default())
        .await
        .expect("discovery");

    assert!(report.success);
    assert!(report.sweep_skipped.is_none());
    assert_eq!(report.devices.len(), 1);

    let device = &report.devices[0];
    assert_eq!(device.ip_address, LOCALHOST);
    assert_eq!(device.name, "Ward 3 Edge");
    assert!(device.capabilities.offline_translation);
    assert!(device.quality > 0.0 && device.quality <= 1.0);

    // Persisted snapshot: device present, preferred, quality-sorted.
    let snapshot = rt.discovery_snapshot().await;
    assert_eq!(snapshot.preferred, Some(LOCALHOST));
    assert!(snapshot.last_discovery.is_some());
    assert_eq!(snapshot.stats.attempts, 1);
    assert_eq!(snapshot.stats.successes, 1);

    // Fresh verification promotes the edge transport.
    let state = rt.endpoint_state();
    assert_eq!(state.transport, TransportMode::EdgeActive);
    assert!(state.is_edge);
}

#[tokio::test]
async fn discovery_refuses_without_network() {
    let server = edge_device_server().await;
    let rt = runtime(server.address().port(), ConnectivityState::offline()).await;

    let result = rt.discover(DiscoverOptions::default()).await;
    assert!(matches!(result, Err(CoreError::NoNetwork)));

    // Persisted state untouched.
    let snapshot = rt.discovery_snapshot().await;
    assert_eq!(snapshot.stats.attempts, 0);
    assert!(snapshot.last_discovery.is_none());
}

#[tokio::test]
async fn non_wifi_link_skips_the_sweep() {
    let server = edge_device_server().await;
    let cellular = ConnectivityState {
        is_connected: true,
        link: LinkType::Cellular,
    };
    let rt = runtime(server.address().port(), cellular).await;

    let report = rt
        .discover(DiscoverOptions::default())
        .await
        .expect("discovery");

    assert_eq!(report.sweep_skipped, Some(SweepSkipReason::NotWifi));
    // No known devices and no sweep: nothing to find.
    assert!(!report.success);
    assert!(report.devices.is_empty());
}

#[tokio::test]
async fn rediscovery_reverifies_known_devices_off_wifi() {
    let server = edge_device_server().await;
    let port = server.address().port();

    // First run on WiFi finds the device via the sweep.
    let (tx, handle) = connectivity::channel(ConnectivityState::online_wifi());
    let rt = EdgeRuntime::with_defaults(
        runtime_config(port),
        Arc::new(MemoryStore::new()),
        handle,
    )
    .await
    .expect("runtime");
    rt.discover(DiscoverOptions::default()).await.expect("discovery");

    // Second run on cellular skips the sweep but still re-probes the
    // known device.
    tx.send(ConnectivityState {
        is_connected: true,
        link: LinkType::Cellular,
    })
    .ok();

    let report = rt
        .discover(DiscoverOptions::default())
        .await
        .expect("rediscovery");

    assert_eq!(report.sweep_skipped, Some(SweepSkipReason::NotWifi));
    assert!(report.success);
    assert_eq!(report.devices.len(), 1);
}

#[tokio::test]
async fn manual_device_management_round_trip() {
    let server = edge_device_server().await;
    let port = server.address().port();
    let rt = runtime(port, ConnectivityState::online_wifi()).await;

    // Add by address without a discovery run.
    let device = rt.add_manual_device(LOCALHOST, port).await.expect("added");
    assert_eq!(device.ip_address, LOCALHOST);
    assert_eq!(rt.endpoint_state().transport, TransportMode::EdgeActive);

    // Pin it explicitly.
    rt.set_preferred_device(LOCALHOST).await.expect("pinned");
    assert!(rt.discovery_snapshot().await.preferred_pinned);

    // Removing the active device drops traffic back to the cloud.
    rt.remove_device(LOCALHOST).await.expect("removed");
    let snapshot = rt.discovery_snapshot().await;
    assert!(snapshot.devices.is_empty());
    assert_eq!(snapshot.preferred, None);
    assert_eq!(rt.endpoint_state().transport, TransportMode::CloudOnly);

    // Removing twice is an error.
    assert!(matches!(
        rt.remove_device(LOCALHOST).await,
        Err(CoreError::DeviceNotFound { .. })
    ));
}

#[tokio::test]
async fn adding_a_dead_address_fails() {
    let server = edge_device_server().await;
    let rt = runtime(server.address().port(), ConnectivityState::online_wifi()).await;

    // Bind-then-release a port so nothing is listening there.
    let dead_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let result = rt.add_manual_device(LOCALHOST, dead_port).await;
    assert!(matches!(result, Err(CoreError::DeviceNotFound { .. })));
}
