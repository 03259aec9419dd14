//! ==============================================================================
//! control.rs - device on/off commands
//! ==============================================================================
//!
//! purpose:
//!     turns the dashboard's "device on" / "device off" buttons into a status
//!     message. with no control endpoint configured the command is simulated.
//!     with one, it is POSTed as `{"device_id": ..., "state": "ON"|"OFF"}`
//!     and the response's `message` field is returned.
//!
//! contract:
//!     `send_command` never returns an error and never waits longer than the
//!     request timeout. every failure becomes a "Failed to send command" string.
//!
//! relationships:
//!     - used by: main.rs (POST /api/device)
//!
//! ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    On,
    Off,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::On => write!(f, "ON"),
            DeviceState::Off => write!(f, "OFF"),
        }
    }
}

impl FromStr for DeviceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Ok(DeviceState::On),
            "off" => Ok(DeviceState::Off),
            other => Err(format!("unknown device state: {}", other)),
        }
    }
}

#[derive(Serialize)]
struct CommandRequest<'a> {
    device_id: &'a str,
    state: DeviceState,
}

#[derive(Deserialize)]
struct CommandResponse {
    message: String,
}

pub struct ControlClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl ControlClient {
    /// `endpoint: None` simulates every command
    pub fn new(endpoint: Option<String>, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn is_simulated(&self) -> bool {
        self.endpoint.is_none()
    }

    /// send a state change and describe the outcome
    pub async fn send_command(&self, device_id: &str, state: DeviceState) -> String {
        let Some(endpoint) = &self.endpoint else {
            info!("[CONTROL] Simulated: {} -> {}", device_id, state);
            return format!("Device {} turned {} (simulated)", device_id, state);
        };

        match self.post_command(endpoint, device_id, state).await {
            Ok(message) => {
                info!("[CONTROL] ✓ {} -> {}: {}", device_id, state, message);
                message
            }
            Err(e) => {
                warn!("[CONTROL] ⚠ {} -> {} failed: {}", device_id, state, e);
                format!("Failed to send command: {}", e)
            }
        }
    }

    async fn post_command(&self, endpoint: &str, device_id: &str, state: DeviceState) -> reqwest::Result<String> {
        let mut request = self
            .client
            .post(endpoint)
            .json(&CommandRequest { device_id, state });
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response: CommandResponse = request.send().await?.error_for_status()?.json().await?;
        Ok(response.message)
    }
}
