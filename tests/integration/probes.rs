//! Integration tests for reachability probes
//!
//! These tests verify that:
//! - HTTP status codes are classified at the 500 boundary
//! - Timeouts and refused connections are down outcomes, not errors
//! - TCP probes succeed on an open port and fail on a closed one

use chrono::Utc;
use site_monitor::{
    monitoring::{HttpProbe, Probe, ProtocolProbe, TcpProbe},
    storage::{NewTarget, Protocol},
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn mock_with_status(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_http_200_is_up() {
    let server = mock_with_status(200).await;
    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();

    let outcome = probe.check(&server.uri()).await;

    assert!(outcome.is_up);
    assert_eq!(outcome.status_code, Some(200));
    assert!(outcome.latency_ms.unwrap() > 0.0);
    assert_eq!(outcome.error, None);
}

#[tokio::test]
async fn test_http_404_still_counts_as_up() {
    let server = mock_with_status(404).await;
    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();

    let outcome = probe.check(&server.uri()).await;

    assert!(outcome.is_up);
    assert_eq!(outcome.status_code, Some(404));
}

#[tokio::test]
async fn test_http_500_is_down_with_status() {
    let server = mock_with_status(500).await;
    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();

    let outcome = probe.check(&server.uri()).await;

    assert!(!outcome.is_up);
    assert_eq!(outcome.status_code, Some(500));
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn test_http_redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_secs(5)).unwrap();
    let outcome = probe.check(&format!("{}/old", server.uri())).await;

    assert!(!outcome.is_up);
    assert_eq!(outcome.status_code, Some(503));
}

#[tokio::test]
async fn test_http_timeout_is_down_without_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let probe = HttpProbe::new(Duration::from_millis(200)).unwrap();
    let outcome = probe.check(&server.uri()).await;

    assert!(!outcome.is_up);
    assert_eq!(outcome.status_code, None);
    assert_eq!(outcome.error.as_deref(), Some("request timed out"));
    assert!(outcome.latency_ms.unwrap() >= 150.0);
}

#[tokio::test]
async fn test_tcp_open_port_is_up() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((_socket, _)) = listener.accept().await {}
    });

    let probe = TcpProbe::new(Duration::from_secs(2));
    let outcome = probe.check("127.0.0.1", port).await;

    assert!(outcome.is_up);
    assert_eq!(outcome.status_code, None);
    assert!(outcome.latency_ms.is_some());
}

#[tokio::test]
async fn test_tcp_closed_port_is_down() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let probe = TcpProbe::new(Duration::from_secs(2));
    let outcome = probe.check("127.0.0.1", port).await;

    assert!(!outcome.is_up);
    assert!(outcome.error.unwrap().starts_with("TCP connection failed"));
}

#[tokio::test]
async fn test_tcp_unanswered_handshake_times_out() {
    // Never accepted with a backlog of 0: once the accept queue is full the
    // kernel drops further SYNs and the connect hangs
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(0).unwrap();
    let port = listener.local_addr().unwrap().port();

    let bound = Duration::from_millis(100);
    let probe = TcpProbe::new(bound);

    let mut timed_out = None;
    for _ in 0..16 {
        let outcome = probe.check("127.0.0.1", port).await;
        if outcome.error.as_deref() == Some("TCP connection timeout") {
            timed_out = Some(outcome);
            break;
        }
        assert!(outcome.is_up, "unexpected outcome {outcome:?}");
    }

    let outcome = timed_out.expect("accept queue never filled up");
    assert!(!outcome.is_up);
    assert_eq!(outcome.status_code, None);
    assert!(outcome.latency_ms.unwrap() >= bound.as_secs_f64() * 1000.0);

    drop(listener);
}

#[tokio::test]
async fn test_protocol_probe_dispatches_tcp_targets() {
    let server = mock_with_status(200).await;
    let mock_url = url::Url::parse(&server.uri()).unwrap();
    let address = format!(
        "tcp://{}:{}",
        mock_url.host_str().unwrap(),
        mock_url.port().unwrap()
    );

    let target = NewTarget::new("Mock TCP", address, Protocol::Tcp).into_target(1, Utc::now());
    let probe = ProtocolProbe::new().unwrap();

    let outcome = tokio_test::assert_ok!(probe.probe(&target).await);
    assert!(outcome.is_up);
    assert_eq!(outcome.status_code, None);
}
