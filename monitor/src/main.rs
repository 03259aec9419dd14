//! ==============================================================================
//! main.rs - sensor monitor entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - build the (cached) sensor source
//!     - serve the dashboard in the background
//!     - run the polling loop until ctrl-c
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                      sensor-monitor                         │
//!     │  ┌─────────────┐        snapshot         ┌──────────────┐   │
//!     │  │ poll loop   │ ──── Arc<RwLock<>> ───> │ web server   │   │
//!     │  │ (10s cycle) │                         │ (port 3000)  │   │
//!     │  └──────┬──────┘                         └──────┬───────┘   │
//!     │         │ CachedSource<HttpSource>              │           │
//!     └─────────┼───────────────────────────────────────┼───────────┘
//!               ▼                                       ▼
//!        remote csv / json                      control endpoint
//!                                                (or simulated)
//!
//! ==============================================================================

use anyhow::Result;
use sensor_monitor::config::MonitorConfig;
use sensor_monitor::control::ControlClient;
use sensor_monitor::dashboard::{self, DashboardState};
use sensor_monitor::fetcher::{CachedSource, HttpSource};
use sensor_monitor::poller::Poller;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration (explicit path wins over the search list)
    let config = match std::env::args().nth(1) {
        Some(path) => MonitorConfig::load(PathBuf::from(path))?,
        None => MonitorConfig::load_or_default(),
    };

    // step 2: logging - RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("===========================================================");
    println!("  IoT Data Viewer - sensor monitor");
    println!("===========================================================");
    config.print_summary();

    // step 3: source + poller
    let source = CachedSource::new(
        HttpSource::new(&config.source.url, config.source.format, config.source_timeout())?,
        config.cache_ttl(),
    );
    let mut poller = Poller::new(
        source,
        config.source.strategy,
        config.polling_interval(),
        config.polling.history_capacity,
    )
    .show_sensor_data(config.logging.show_sensor_data);

    // step 4: dashboard in background
    let api_key = Some(config.device.api_key.clone());
    let control = ControlClient::new(config.device.control_url.clone(), api_key, config.source_timeout())?;
    if control.is_simulated() {
        info!("[CONTROL] No control_url configured - device commands are simulated");
    }
    let state = DashboardState {
        snapshot: poller.snapshot(),
        control: Arc::new(control),
        device_id: Arc::from(config.device.device_id.as_str()),
    };
    let bind = config.server.bind.clone();
    tokio::spawn(async move {
        if let Err(e) = dashboard::serve(&bind, state).await {
            error!("[SERVER] Web server error: {:#}", e);
        }
    });

    // step 5: poll until ctrl-c
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[RUNTIME] Ctrl-C received, stopping");
            on_signal.cancel();
        }
    });

    poller.run(cancel, None).await;
    Ok(())
}
