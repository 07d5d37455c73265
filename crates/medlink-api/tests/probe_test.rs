// Prober tests using wiremock. Every negative outcome must come back
// as `None`, never as an error.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medlink_api::Prober;

const LOCALHOST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

async fn setup() -> (MockServer, u16, Prober) {
    let server = MockServer::start().await;
    let port = server.address().port();
    let prober = Prober::with_defaults().expect("prober construction");
    (server, port, prober)
}

#[tokio::test]
async fn test_probe_accepts_edge_service() {
    let (server, port, prober) = setup().await;

    let body = json!({
        "status": "ok",
        "service": "medlink-edge",
        "name": "Clinic Edge 1",
        "version": "1.2.3",
        "capabilities": {
            "offlineTranslation": true,
            "audioProcessing": true,
        },
    });

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let result = prober.probe(LOCALHOST, port).await;

    let success = result.expect("expected a positive probe");
    assert_eq!(success.ip, LOCALHOST);
    assert_eq!(success.port, port);
    assert_eq!(success.health.name.as_deref(), Some("Clinic Edge 1"));
    assert_eq!(success.health.version.as_deref(), Some("1.2.3"));
    assert_eq!(
        success.health.capabilities.get("offlineTranslation"),
        Some(&true)
    );
}

#[tokio::test]
async fn test_probe_rejects_foreign_service() {
    let (server, port, prober) = setup().await;

    // Something else is listening and answering /health -- a NAS, a
    // dev server -- with a body that doesn't self-identify as ours.
    let body = json!({ "status": "ok", "service": "some-other-daemon" });

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    assert!(prober.probe(LOCALHOST, port).await.is_none());
}

#[tokio::test]
async fn test_probe_rejects_missing_service_field() {
    let (server, port, prober) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    assert!(prober.probe(LOCALHOST, port).await.is_none());
}

#[tokio::test]
async fn test_probe_rejects_error_status() {
    let (server, port, prober) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(prober.probe(LOCALHOST, port).await.is_none());
}

#[tokio::test]
async fn test_probe_rejects_unparsable_body() {
    let (server, port, prober) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
        .mount(&server)
        .await;

    assert!(prober.probe(LOCALHOST, port).await.is_none());
}

#[tokio::test]
async fn test_probe_nothing_listening_is_negative_not_error() {
    // Bind and immediately release a port so nothing is listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };

    let prober = Prober::with_defaults().expect("prober construction");
    assert!(prober.probe(LOCALHOST, port).await.is_none());
}

#[tokio::test]
async fn test_probe_times_out_as_negative() {
    let (server, port, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "ok", "service": "medlink-edge" }))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;

    let prober = Prober::new(Duration::from_millis(100)).expect("prober construction");
    assert!(prober.probe(LOCALHOST, port).await.is_none());
}
