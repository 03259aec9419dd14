//! fetch-time error kinds.
//!
//! every variant is caught at the fetcher boundary and turned into an empty
//! table; the display string is what the dashboard shows as a warning.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// transport failure, timeout or non-2xx status
    #[error("failed to fetch sensor data: {0}")]
    Network(String),

    /// payload is not valid csv/json or a value is not a number
    #[error("malformed sensor data: {0}")]
    Parse(String),

    /// payload is missing one or more required columns
    #[error("sensor data is missing columns: {}", .0.join(", "))]
    SchemaMismatch(Vec<String>),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}
