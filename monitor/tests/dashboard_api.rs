use sensor_monitor::control::ControlClient;
use sensor_monitor::dashboard::{router, DashboardState};
use sensor_monitor::poller::{DashboardSnapshot, SharedSnapshot};
use sensor_monitor::{Reading, RemoteTable};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

async fn spawn_dashboard(snapshot: SharedSnapshot, control: ControlClient) -> SocketAddr {
    let state = DashboardState {
        snapshot,
        control: Arc::new(control),
        device_id: Arc::from("sensor-01"),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

fn simulated() -> ControlClient {
    ControlClient::new(None, None, Duration::from_secs(5)).unwrap()
}

fn sample_snapshot() -> SharedSnapshot {
    let history = vec![
        Reading::new("2024-01-01 10:00:00", 20.0, 50.0),
        Reading::new("2024-01-01 10:00:10", 21.0, 51.0),
    ];
    Arc::new(RwLock::new(DashboardSnapshot {
        table: RemoteTable::new(history.clone()),
        last_update: Some("2024-01-01 10:00:10".to_string()),
        cycles: 2,
        history,
        last_error: None,
    }))
}

#[tokio::test]
async fn api_returns_snapshot_json() {
    let addr = spawn_dashboard(sample_snapshot(), simulated()).await;
    let body: Value = reqwest::get(format!("http://{}/api", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["cycles"], 2);
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
    assert_eq!(body["history"][1]["temperature"], 21.0);
    assert_eq!(body["table"]["rows"][0]["humidity"], 50.0);
    assert!(body["last_error"].is_null());
}

#[tokio::test]
async fn device_buttons_return_status_message() {
    let addr = spawn_dashboard(sample_snapshot(), simulated()).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("http://{}/api/device?state=on", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Device sensor-01 turned ON (simulated)");

    let body: Value = client
        .post(format!("http://{}/api/device?state=blink", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "error");

    let response = client
        .post(format!("http://{}/api/device", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "missing device state");
}

#[tokio::test]
async fn device_command_forwards_to_control_endpoint() {
    use axum::{http::HeaderMap, routing::post, Json, Router};

    let endpoint = Router::new().route(
        "/devices",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            let key = headers
                .get("x-api-key")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("none");
            Json(serde_json::json!({
                "message": format!(
                    "{} is now {} (key {})",
                    body["device_id"].as_str().unwrap_or("?"),
                    body["state"].as_str().unwrap_or("?"),
                    key
                )
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, endpoint).await.unwrap();
    });

    let control = ControlClient::new(
        Some(format!("http://{}/devices", endpoint_addr)),
        Some("secret".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    let addr = spawn_dashboard(sample_snapshot(), control).await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/api/device?state=off", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "sensor-01 is now OFF (key secret)");
}

#[tokio::test]
async fn dashboard_page_shows_warning_after_failed_fetch() {
    let snapshot = Arc::new(RwLock::new(DashboardSnapshot {
        history: vec![Reading::zeroed("2024-01-01 10:00:00")],
        last_error: Some("failed to fetch sensor data: timed out".to_string()),
        cycles: 1,
        ..Default::default()
    }));
    let addr = spawn_dashboard(snapshot, simulated()).await;

    let html = reqwest::get(format!("http://{}/", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("failed to fetch sensor data: timed out"));
    assert!(html.contains("No data available"));
    assert!(html.contains("Turn Device ON"));
}
