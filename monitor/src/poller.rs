//! ==============================================================================
//! poller.rs - fixed-interval polling loop feeding the sample history
//! ==============================================================================
//!
//! purpose:
//!     on every cycle: fetch the remote table, pick the next reading, stamp it
//!     with the wall clock, append it to the bounded history and publish a
//!     snapshot for the dashboard.
//!
//! strategies:
//!     - Replay: cycle deterministically through the table's rows
//!               (row_index % len), simulating a live feed from a static csv.
//!     - Live:   take the latest row of a freshly fetched table
//!               (a mock endpoint that returns the current sample).
//!
//! loop shape:
//!
//! ```text
//!     ┌──────────┐   ┌──────────────┐   ┌─────────┐   ┌─────────┐
//!     │  fetch   │──>│ fallback on  │──>│ advance │──>│ publish │
//!     │ (source) │   │ error: empty │   │ (state) │   │ snapshot│
//!     └──────────┘   └──────────────┘   └─────────┘   └────┬────┘
//!          ^                                                │
//!          └───────── sleep(interval) | cancelled ──────────┘
//! ```
//!
//! relationships:
//!     - uses: fetcher.rs (TableSource, fetch_or_empty)
//!     - uses: domain.rs (SampleHistory, Reading)
//!     - read by: main.rs (dashboard handlers read the snapshot)
//!
//! ==============================================================================

use crate::domain::{Reading, RemoteTable, SampleHistory, TIMESTAMP_FORMAT};
use crate::fetcher::{fetch_or_empty, TableSource};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStrategy {
    /// cycle through the table's rows in order, wrapping at the end
    #[default]
    Replay,
    /// use the most recent row of each fetch
    Live,
}

/// everything the polling loop carries between cycles
#[derive(Debug, Clone, Default)]
pub struct PollerState {
    /// number of rows consumed so far by the replay strategy
    pub row_index: u64,
    pub history: SampleHistory,
}

impl PollerState {
    pub fn new(capacity: usize) -> Self {
        Self {
            row_index: 0,
            history: SampleHistory::new(capacity),
        }
    }
}

/// select the next reading, stamp it with `now` and append it to the history
///
/// an empty table yields a zero-valued reading and leaves `row_index` alone.
pub fn advance(
    state: &mut PollerState,
    table: &RemoteTable,
    strategy: ReadingStrategy,
    now: NaiveDateTime,
) -> Reading {
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

    let selected = match strategy {
        ReadingStrategy::Replay if !table.is_empty() => {
            let row = &table.rows[(state.row_index % table.len() as u64) as usize];
            state.row_index += 1;
            Some(row)
        }
        ReadingStrategy::Replay => None,
        ReadingStrategy::Live => table.latest(),
    };

    let reading = match selected {
        Some(row) => Reading::new(timestamp, row.temperature, row.humidity),
        None => Reading::zeroed(timestamp),
    };

    state.history.push(reading.clone());
    reading
}

// ==============================================================================
// shared snapshot
// ==============================================================================
// written only by the polling loop, read by the web handlers.
// arc<rwlock<>>: many readers OR one writer.

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    /// recent readings, oldest first
    pub history: Vec<Reading>,
    /// the table fetched on the last cycle (empty after a failure)
    pub table: RemoteTable,
    /// warning to surface to the user, if the last fetch failed
    pub last_error: Option<String>,
    /// timestamp of the last reading
    pub last_update: Option<String>,
    pub cycles: u64,
}

pub type SharedSnapshot = Arc<RwLock<DashboardSnapshot>>;

// ==============================================================================
// polling loop
// ==============================================================================

pub struct Poller<S> {
    source: S,
    strategy: ReadingStrategy,
    interval: Duration,
    state: PollerState,
    snapshot: SharedSnapshot,
    show_data: bool,
    cycles: u64,
}

impl<S: TableSource> Poller<S> {
    pub fn new(source: S, strategy: ReadingStrategy, interval: Duration, capacity: usize) -> Self {
        Self {
            source,
            strategy,
            interval,
            state: PollerState::new(capacity),
            snapshot: SharedSnapshot::default(),
            show_data: false,
            cycles: 0,
        }
    }

    /// log every reading at info level
    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_data = show;
        self
    }

    /// handle for readers of the published state
    pub fn snapshot(&self) -> SharedSnapshot {
        self.snapshot.clone()
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// run a single fetch -> advance -> publish cycle
    ///
    /// never fails: fetch errors become an empty table and a published warning.
    pub async fn poll_once(&mut self) -> Reading {
        let (table, error) = fetch_or_empty(&self.source).await;
        let reading = advance(&mut self.state, &table, self.strategy, Local::now().naive_local());
        self.cycles += 1;

        if self.show_data {
            info!(
                "[POLL] #{} {} | Temp: {:.1}°C | Humidity: {:.1}% | history {}",
                self.cycles,
                reading.timestamp,
                reading.temperature,
                reading.humidity,
                self.state.history.len()
            );
        }

        let mut snapshot = self.snapshot.write().await;
        snapshot.history = self.state.history.to_vec();
        snapshot.table = table;
        snapshot.last_error = error.map(|e| e.to_string());
        snapshot.last_update = Some(reading.timestamp.clone());
        snapshot.cycles = self.cycles;

        reading
    }

    /// poll until cancelled, or until `max_cycles` cycles have run
    ///
    /// returns the number of cycles completed by this call.
    pub async fn run(&mut self, cancel: CancellationToken, max_cycles: Option<u64>) -> u64 {
        info!("[POLL] Starting sensor polling ({}s interval)", self.interval.as_secs());
        let mut completed = 0;

        while !cancel.is_cancelled() {
            self.poll_once().await;
            completed += 1;

            if max_cycles.is_some_and(|max| completed >= max) {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("[POLL] Stopped after {} cycles", completed);
        completed
    }
}
