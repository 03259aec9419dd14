//! ==============================================================================
//! sensor-monitor - remote sensor table poller with a bounded sample history
//! ==============================================================================
//!
//! modules:
//!     - domain:    Reading, RemoteTable, SampleHistory
//!     - error:     FetchError (network / parse / schema)
//!     - fetcher:   csv/json parsing, HttpSource, ttl CachedSource
//!     - poller:    replay/live strategies, PollerState, cancellable loop
//!     - control:   simulated or http device on/off commands
//!     - config:    monitor.toml loader
//!     - dashboard: axum routes rendering the published snapshot
//!
//! ==============================================================================

pub mod config;
pub mod control;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod poller;

pub use domain::{Reading, RemoteTable, SampleHistory};
pub use error::FetchError;
