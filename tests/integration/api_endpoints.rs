//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Target CRUD returns correct responses and status codes
//! - Ad-hoc and background checks behave as documented
//! - Authentication middleware functions properly
//! - Live connections receive lifecycle and check events
//! - The command protocol answers on the same connection

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{Value, json};
use site_monitor::{
    api::{ApiConfig, ApiState, spawn_api_server},
    events::{ConnectionRegistry, EventBroadcaster, EventBus, bus::DisabledBus, bus::LocalBus},
    monitoring::{CycleRunner, CycleScheduler, ProtocolProbe},
    storage::{MemoryRegistry, TargetRegistry},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestApi {
    addr: SocketAddr,
    registry: Arc<MemoryRegistry>,
    client: reqwest::Client,
    token: Option<&'static str>,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.request(reqwest::Method::GET, path).send().await.unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.request(reqwest::Method::POST, path)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn create(&self, name: &str, address: &str, protocol: &str) -> Value {
        let response = self
            .post(
                "/targets",
                json!({"name": name, "address": address, "protocol": protocol}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn connect_ws(&self) -> WsStream {
        let (ws, _) = connect_async(format!("ws://{}/api/v1/ws/monitoring", self.addr))
            .await
            .unwrap();
        ws
    }
}

async fn spawn_test_api_with_bus(
    bus: Arc<dyn EventBus>,
    connections: ConnectionRegistry,
    token: Option<&'static str>,
) -> TestApi {
    let registry = Arc::new(MemoryRegistry::new());
    let broadcaster = EventBroadcaster::new(bus, connections);
    let probe = Arc::new(ProtocolProbe::new().unwrap());
    let runner = Arc::new(CycleRunner::new(registry.clone(), probe, broadcaster.clone()));
    let scheduler = Arc::new(CycleScheduler::new(runner, Duration::from_secs(60)));

    let state = ApiState::new(registry.clone(), broadcaster, scheduler);
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        auth_token: token.map(str::to_string),
        enable_cors: true,
    };

    let addr = spawn_api_server(config, state).await.unwrap();

    TestApi {
        addr,
        registry,
        client: reqwest::Client::new(),
        token,
    }
}

async fn spawn_test_api(token: Option<&'static str>) -> TestApi {
    spawn_test_api_with_bus(Arc::new(DisabledBus), ConnectionRegistry::new(), token).await
}

async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .unwrap();

        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn mock_site(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let api = spawn_test_api(Some("test-token")).await;

    let response = api.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_api_without_token_when_required_fails_401() {
    let api = spawn_test_api(Some("test-token")).await;

    let response = api.client.get(api.url("/targets")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_with_invalid_token_fails_403() {
    let api = spawn_test_api(Some("test-token")).await;

    let response = api
        .client
        .get(api.url("/targets"))
        .header("Authorization", "Bearer wrong-token")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_target_crud_lifecycle() {
    let api = spawn_test_api(Some("test-token")).await;

    let created = api.create("Docs", "https://docs.example", "https").await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["check_interval"], 60);
    assert_eq!(created["is_active"], true);

    let fetched: Value = api.get(&format!("/targets/{id}")).await.json().await.unwrap();
    assert_eq!(fetched["name"], "Docs");

    let updated: Value = api
        .request(reqwest::Method::PATCH, &format!("/targets/{id}"))
        .json(&json!({"is_active": false, "name": "Docs v2"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "Docs v2");
    assert_eq!(updated["is_active"], false);

    let active: Value = api.get("/targets?is_active=true").await.json().await.unwrap();
    assert_eq!(active["count"], 0);
    let all: Value = api.get("/targets").await.json().await.unwrap();
    assert_eq!(all["count"], 1);

    let deleted = api
        .request(reqwest::Method::DELETE, &format!("/targets/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    assert_eq!(api.get(&format!("/targets/{id}")).await.status(), StatusCode::NOT_FOUND);
    let again = api
        .request(reqwest::Method::DELETE, &format!("/targets/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_address_is_rejected() {
    let api = spawn_test_api(None).await;
    api.create("First", "https://same.example", "https").await;

    let response = api
        .post(
            "/targets",
            json!({"name": "Second", "address": "https://same.example"}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already exists"));
    assert_eq!(api.registry.list_targets(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_creates_with_same_address_register_once() {
    let api = Arc::new(spawn_test_api(None).await);

    let mut tasks = vec![];
    for i in 0..8 {
        let api = api.clone();
        tasks.push(tokio::spawn(async move {
            api.post(
                "/targets",
                json!({"name": format!("Racer {i}"), "address": "https://race.example"}),
            )
            .await
            .status()
        }));
    }

    let mut created = 0;
    for task in tasks {
        let status = task.await.unwrap();
        if status == StatusCode::CREATED {
            created += 1;
        } else {
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    assert_eq!(created, 1);
    assert_eq!(api.registry.list_targets(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_checks_limit_is_validated() {
    let api = spawn_test_api(None).await;
    let created = api.create("Docs", "https://docs.example", "https").await;
    let id = created["id"].as_i64().unwrap();

    assert_eq!(
        api.get(&format!("/targets/{id}/checks?limit=0")).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        api.get(&format!("/targets/{id}/checks?limit=201")).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        api.get("/targets/999/checks").await.status(),
        StatusCode::NOT_FOUND
    );

    let body: Value = api
        .get(&format!("/targets/{id}/checks?limit=200"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_run_check_streams_events_to_live_connection() {
    let site = mock_site(200).await;
    let api = spawn_test_api(None).await;

    let mut ws = api.connect_ws().await;
    let welcome = next_event(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");

    let created = api.create("Mock", &site.uri(), "http").await;
    let id = created["id"].as_i64().unwrap();

    let event = next_event(&mut ws).await;
    assert_eq!(event["type"], "target.created");
    assert_eq!(event["payload"]["id"], id);

    let response = api.post("/monitoring/run-check", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["summary"]["targets_checked"], 1);
    assert_eq!(body["summary"]["up"], 1);

    let check = next_event(&mut ws).await;
    assert_eq!(check["type"], "check.completed");
    assert_eq!(check["payload"]["target_id"], id);
    assert_eq!(check["payload"]["is_up"], true);

    let cycle = next_event(&mut ws).await;
    assert_eq!(cycle["type"], "check.cycle.completed");
    assert_eq!(cycle["payload"]["targets_checked"], 1);

    let history: Value = api
        .get(&format!("/targets/{id}/checks"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["count"], 1);
    assert_eq!(history["checks"][0]["status_code"], 200);
    assert!(history["checks"][0]["latency_ms"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_start_background_is_idempotent() {
    let api = spawn_test_api(None).await;

    let status: Value = api.get("/monitoring/status").await.json().await.unwrap();
    assert_eq!(status["status"], "stopped");
    assert_eq!(status["check_interval_secs"], 60);

    let first: Value = api
        .post("/monitoring/start-background", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["started"], true);

    let second: Value = api
        .post("/monitoring/start-background", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["started"], false);

    let status: Value = api.get("/monitoring/status").await.json().await.unwrap();
    assert_eq!(status["status"], "active");
}

#[tokio::test]
async fn test_command_protocol_replies_on_same_connection() {
    let api = spawn_test_api(None).await;
    let mut ws = api.connect_ws().await;
    next_event(&mut ws).await;

    ws.send(Message::Text("Who are you, warrior?".into()))
        .await
        .unwrap();
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["type"], "challenge.accepted");
    assert_eq!(reply["payload"]["answer"], "I am Achilles, son of Peleus");

    ws.send(Message::Text("subscribe:check.completed".into()))
        .await
        .unwrap();
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["type"], "subscription");
    assert_eq!(reply["payload"]["event"], "check.completed");
    assert_eq!(reply["payload"]["status"], "subscribed");

    ws.send(Message::Text("hello".into())).await.unwrap();
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["type"], "echo");
    assert_eq!(reply["payload"]["received"], "hello");
}

#[tokio::test]
async fn test_websocket_accepts_token_in_query() {
    let api = spawn_test_api(Some("test-token")).await;
    let url = format!("ws://{}/api/v1/ws/monitoring", api.addr);

    let rejected = connect_async(url.clone()).await;
    assert!(rejected.is_err());

    let (mut ws, _) = connect_async(format!("{url}?token=test-token")).await.unwrap();
    let welcome = next_event(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
}

#[tokio::test]
async fn test_closed_connection_is_unregistered() {
    let connections = ConnectionRegistry::new();
    let api = spawn_test_api_with_bus(Arc::new(DisabledBus), connections.clone(), None).await;

    let mut ws = api.connect_ws().await;
    next_event(&mut ws).await;
    assert_eq!(connections.len().await, 1);

    ws.close(None).await.unwrap();

    let mut remaining = 1;
    for _ in 0..50 {
        remaining = connections.len().await;
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_events_arrive_through_bus_when_connected() {
    let connections = ConnectionRegistry::new();
    let bus = Arc::new(LocalBus::new("monitoring.events"));
    let _subscriber = bus.subscribe_connections(connections.clone());
    let api = spawn_test_api_with_bus(bus.clone(), connections, None).await;

    let mut ws = api.connect_ws().await;
    next_event(&mut ws).await;

    api.create("Via bus", "https://bus.example", "https").await;
    let inbound = next_event(&mut ws).await;
    assert_eq!(inbound["type"], "nats.inbound");
    assert_eq!(inbound["payload"]["subject"], "monitoring.events");
    assert_eq!(inbound["payload"]["event"]["type"], "target.created");

    // Losing the bus falls back to direct fan-out, exactly once
    bus.set_connected(false);
    api.create("Direct", "https://direct.example", "https").await;
    let direct = next_event(&mut ws).await;
    assert_eq!(direct["type"], "target.created");
    assert_eq!(direct["payload"]["name"], "Direct");

    let extra = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert_matches!(extra, Err(_));
}
