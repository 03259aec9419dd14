//! ==============================================================================
//! domain.rs - readings, remote tables and the bounded sample history
//! ==============================================================================
//!
//! purpose:
//!     the plain data types shared by the fetcher, the poller and the
//!     presentation layer.
//!
//! relationships:
//!     - produced by: fetcher.rs (RemoteTable)
//!     - mutated by: poller.rs (SampleHistory via PollerState)
//!     - read by: main.rs (dashboard + json api)
//!
//! ==============================================================================

use serde::Serialize;
use std::collections::VecDeque;

/// columns every remote table must carry
pub const REQUIRED_COLUMNS: [&str; 3] = ["timestamp", "temperature", "humidity"];

/// default number of readings kept in the history
pub const HISTORY_CAPACITY: usize = 50;

/// chrono format used to stamp readings (`YYYY-MM-DD HH:MM:SS`)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// one timestamped temperature/humidity sample
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: String,
    /// temperature in celsius
    pub temperature: f64,
    /// relative humidity (0-100%)
    pub humidity: f64,
}

impl Reading {
    pub fn new(timestamp: impl Into<String>, temperature: f64, humidity: f64) -> Self {
        Self {
            timestamp: timestamp.into(),
            temperature,
            humidity,
        }
    }

    /// fallback reading used when there is nothing to select from
    pub fn zeroed(timestamp: impl Into<String>) -> Self {
        Self::new(timestamp, 0.0, 0.0)
    }
}

/// a parsed and validated csv/json payload
///
/// a table either holds every row of the payload or none of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RemoteTable {
    pub rows: Vec<Reading>,
}

impl RemoteTable {
    pub fn new(rows: Vec<Reading>) -> Self {
        Self { rows }
    }

    /// schema-preserving empty result
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// most recent row (the last one in payload order)
    pub fn latest(&self) -> Option<&Reading> {
        self.rows.last()
    }
}

/// bounded, insertion-ordered store of recent readings
///
/// insertion order is temporal order. once full, every push drops the
/// oldest entry so the history always holds the newest `capacity` readings.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleHistory {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        // a zero-sized history would silently discard everything
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().cloned().collect()
    }
}

impl Default for SampleHistory {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
