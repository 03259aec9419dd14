//! ==============================================================================
//! dashboard.rs - web presentation layer
//! ==============================================================================
//!
//! purpose:
//!     serves what the poller publishes. it only reads the snapshot; the two
//!     device buttons go through control.rs.
//!
//! routes:
//!     GET  /                      html page: warning, chart, history, fetched table
//!     GET  /api                   json snapshot
//!     POST /api/device?state=on   device command -> {"status", "message"}
//!
//! relationships:
//!     - reads: poller.rs (SharedSnapshot)
//!     - calls: control.rs (ControlClient::send_command)
//!     - started by: main.rs
//!
//! ==============================================================================

use crate::control::{ControlClient, DeviceState};
use crate::domain::Reading;
use crate::poller::{DashboardSnapshot, SharedSnapshot};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::fmt::Write;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 220.0;

#[derive(Clone)]
pub struct DashboardState {
    pub snapshot: SharedSnapshot,
    pub control: Arc<ControlClient>,
    pub device_id: Arc<str>,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api", get(api_handler))
        .route("/api/device", post(device_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// bind and serve until the process exits
pub async fn serve(bind: &str, state: DashboardState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("[SERVER] ✓ Dashboard live at http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn dashboard_handler(State(state): State<DashboardState>) -> Html<String> {
    let snapshot = state.snapshot.read().await;
    Html(render_html(&snapshot, &state.device_id))
}

/// json api endpoint for programmatic access
async fn api_handler(State(state): State<DashboardState>) -> Json<DashboardSnapshot> {
    let snapshot = state.snapshot.read().await;
    Json(snapshot.clone())
}

#[derive(Deserialize)]
struct DeviceParams {
    state: Option<String>,
}

async fn device_handler(
    State(state): State<DashboardState>,
    Query(params): Query<DeviceParams>,
) -> Json<serde_json::Value> {
    let Some(raw) = params.state else {
        return Json(serde_json::json!({"status": "error", "message": "missing device state"}));
    };

    match raw.parse::<DeviceState>() {
        Ok(device_state) => {
            let message = state.control.send_command(&state.device_id, device_state).await;
            Json(serde_json::json!({"status": "ok", "message": message}))
        }
        Err(e) => Json(serde_json::json!({"status": "error", "message": e})),
    }
}

// ==============================================================================
// html rendering
// ==============================================================================

pub fn render_html(snapshot: &DashboardSnapshot, device_id: &str) -> String {
    let mut body = String::new();

    if let Some(err) = &snapshot.last_error {
        let _ = write!(body, r#"<p class="error">⚠️ {}</p>"#, html_escape(err));
    }

    if snapshot.table.is_empty() {
        body.push_str(r#"<p class="warning">No data available. Check the sensor source.</p>"#);
    }

    if !snapshot.history.is_empty() {
        body.push_str("<h2>Temperature and Humidity</h2>");
        body.push_str(&svg_chart(&snapshot.history));
        body.push_str("<h2>Recent Readings</h2>");
        body.push_str(&readings_table(snapshot.history.iter().rev()));
    }

    if !snapshot.table.is_empty() {
        body.push_str("<h2>Sensor Data</h2>");
        body.push_str(&readings_table(snapshot.table.rows.iter()));
    }

    let device_id = html_escape(device_id);
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>IoT Data Viewer</title></head>
<body style="font-family: system-ui; padding: 2rem; background: #1a1a2e; color: #eee;">
<h1>IoT Data Viewer</h1>
<p>device: <b>{device_id}</b> | last update: {last_update} | cycles: {cycles}</p>
<form method="post" action="/api/device?state=on" style="display:inline"><button>Turn Device ON</button></form>
<form method="post" action="/api/device?state=off" style="display:inline"><button>Turn Device OFF</button></form>
{body}
</body>
</html>"#,
        last_update = html_escape(snapshot.last_update.as_deref().unwrap_or("never")),
        cycles = snapshot.cycles,
    )
}

fn readings_table<'a>(rows: impl Iterator<Item = &'a Reading>) -> String {
    let mut html = String::from(
        "<table><tr><th>timestamp</th><th>temperature</th><th>humidity</th></tr>",
    );
    for r in rows {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td></tr>",
            html_escape(&r.timestamp),
            r.temperature,
            r.humidity
        );
    }
    html.push_str("</table>");
    html
}

/// two polylines (temperature, humidity) sharing one y scale
fn svg_chart(history: &[Reading]) -> String {
    let values = history.iter().flat_map(|r| [r.temperature, r.humidity]);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let span = if max > min { max - min } else { 1.0 };
    let step = if history.len() > 1 {
        CHART_WIDTH / (history.len() - 1) as f64
    } else {
        0.0
    };

    let points = |pick: fn(&Reading) -> f64| {
        history
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let y = CHART_HEIGHT - (pick(r) - min) / span * CHART_HEIGHT;
                format!("{:.1},{:.1}", i as f64 * step, y)
            })
            .collect::<Vec<_>>()
            .join(" ")
    };

    format!(
        r##"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" style="background:#16213e">
<polyline fill="none" stroke="#ff6b6b" stroke-width="2" points="{temp}"><title>temperature</title></polyline>
<polyline fill="none" stroke="#4dabf7" stroke-width="2" points="{hum}"><title>humidity</title></polyline>
</svg>"##,
        w = CHART_WIDTH,
        h = CHART_HEIGHT,
        temp = points(|r: &Reading| r.temperature),
        hum = points(|r: &Reading| r.humidity),
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
