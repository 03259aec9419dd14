//! ==============================================================================
//! fetcher.rs - remote table retrieval, validation and ttl caching
//! ==============================================================================
//!
//! purpose:
//!     pulls the sensor table (csv or json) from a remote endpoint, validates
//!     that the required columns are present and hands back a RemoteTable.
//!
//! error policy:
//!     every failure is a FetchError. `fetch_or_empty` is the boundary where
//!     errors become an empty table so the poller and dashboard can carry on.
//!     a table is never partially accepted: one bad row rejects the payload.
//!
//! relationships:
//!     - used by: poller.rs (through the TableSource trait)
//!     - uses: domain.rs (RemoteTable, Reading), error.rs (FetchError)
//!
//! ==============================================================================

use crate::domain::{Reading, RemoteTable, REQUIRED_COLUMNS};
use crate::error::FetchError;

use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// per-request timeout observed on the sensor source
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// how long a fetched table stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

// ==============================================================================
// payload parsing
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Csv,
    Json,
}

impl PayloadFormat {
    pub fn parse(&self, body: &str) -> Result<RemoteTable, FetchError> {
        match self {
            PayloadFormat::Csv => parse_csv(body),
            PayloadFormat::Json => parse_json(body),
        }
    }
}

/// names of the required columns whose presence flag is false
fn missing_columns(present: [bool; 3]) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .zip(present)
        .filter(|(_, found)| !found)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// parse a `timestamp,temperature,humidity` csv table
///
/// columns may appear in any order and extra columns are ignored.
pub fn parse_csv(text: &str) -> Result<RemoteTable, FetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| FetchError::Parse(e.to_string()))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let (ts_col, temp_col, hum_col) =
        match (column("timestamp"), column("temperature"), column("humidity")) {
            (Some(ts), Some(t), Some(h)) => (ts, t, h),
            (ts, t, h) => {
                return Err(FetchError::SchemaMismatch(missing_columns([
                    ts.is_some(),
                    t.is_some(),
                    h.is_some(),
                ])))
            }
        };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FetchError::Parse(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        rows.push(Reading::new(
            csv_field(&record, ts_col, "timestamp", line)?,
            csv_number(&record, temp_col, "temperature", line)?,
            csv_number(&record, hum_col, "humidity", line)?,
        ));
    }

    Ok(RemoteTable::new(rows))
}

fn csv_field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<&'r str, FetchError> {
    record
        .get(idx)
        .ok_or_else(|| FetchError::Parse(format!("line {}: no {} field", line, name)))
}

fn csv_number(record: &csv::StringRecord, idx: usize, name: &str, line: u64) -> Result<f64, FetchError> {
    let raw = csv_field(record, idx, name, line)?;
    raw.parse::<f64>()
        .map_err(|_| FetchError::Parse(format!("line {}: {} {:?} is not a number", line, name, raw)))
}

/// parse a json payload
///
/// two shapes are accepted:
///     - `{"timestamp": "...", "sensors": {"temperature": 21.5, "humidity": 40}}`
///       (a single live sample, timestamp optional)
///     - `[{"timestamp": "...", "temperature": 21.5, "humidity": 40}, ...]`
pub fn parse_json(text: &str) -> Result<RemoteTable, FetchError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FetchError::Parse(e.to_string()))?;

    match &value {
        Value::Array(rows) => rows
            .iter()
            .map(|row| reading_from_fields(row, row.get("timestamp").and_then(json_text)))
            .collect::<Result<Vec<_>, _>>()
            .map(RemoteTable::new),
        Value::Object(obj) => {
            let sensors = obj
                .get("sensors")
                .ok_or_else(|| FetchError::SchemaMismatch(vec!["sensors".to_string()]))?;
            let timestamp = obj.get("timestamp").and_then(json_text).unwrap_or_default();
            let reading = reading_from_fields(sensors, Some(timestamp))?;
            Ok(RemoteTable::new(vec![reading]))
        }
        other => Err(FetchError::Parse(format!(
            "expected a `sensors` object or an array of rows, got {}",
            other
        ))),
    }
}

/// a null value counts as absent
fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn json_number(fields: &Value, key: &str) -> Result<Option<f64>, FetchError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| FetchError::Parse(format!("{} {} is not a number", key, v))),
    }
}

fn reading_from_fields(fields: &Value, timestamp: Option<String>) -> Result<Reading, FetchError> {
    let temperature = json_number(fields, "temperature")?;
    let humidity = json_number(fields, "humidity")?;

    match (timestamp, temperature, humidity) {
        (Some(ts), Some(t), Some(h)) => Ok(Reading::new(ts, t, h)),
        (ts, t, h) => Err(FetchError::SchemaMismatch(missing_columns([
            ts.is_some(),
            t.is_some(),
            h.is_some(),
        ]))),
    }
}

// ==============================================================================
// table sources
// ==============================================================================
// the network seam. the poller only knows about TableSource, so tests can
// drive it with scripted tables and failures.

pub trait TableSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<RemoteTable, FetchError>> + Send;
}

impl<S: TableSource> TableSource for Arc<S> {
    fn fetch(&self) -> impl Future<Output = Result<RemoteTable, FetchError>> + Send {
        (**self).fetch()
    }
}

/// single GET against a fixed url
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
    format: PayloadFormat,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, format: PayloadFormat, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            format,
        })
    }
}

impl TableSource for HttpSource {
    async fn fetch(&self) -> Result<RemoteTable, FetchError> {
        debug!("[FETCH] GET {}", self.url);
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let table = self.format.parse(&body)?;
        debug!("[FETCH] ✓ {} rows from {}", table.len(), self.url);
        Ok(table)
    }
}

/// one-shot fetch without caching
pub async fn fetch(url: &str, timeout: Duration, format: PayloadFormat) -> Result<RemoteTable, FetchError> {
    HttpSource::new(url, format, timeout)?.fetch().await
}

/// time-to-live memoization in front of another source
///
/// the cache key is time alone. a fresh entry is returned as-is; an expired
/// one triggers an unconditional refetch. failures are never cached, so the
/// next call after an error goes back to the network.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    cached: Mutex<Option<(Instant, RemoteTable)>>,
}

impl<S: TableSource> CachedSource<S> {
    /// a zero ttl disables caching
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: Mutex::new(None),
        }
    }
}

impl<S: TableSource> TableSource for CachedSource<S> {
    async fn fetch(&self) -> Result<RemoteTable, FetchError> {
        let mut guard = self.cached.lock().await;

        if let Some((fetched_at, table)) = guard.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                debug!("[FETCH] cache hit ({}s old)", fetched_at.elapsed().as_secs());
                return Ok(table.clone());
            }
        }

        let table = self.inner.fetch().await?;
        if !self.ttl.is_zero() {
            *guard = Some((Instant::now(), table.clone()));
        }
        Ok(table)
    }
}

/// fetch, substituting an empty table on any error
///
/// the error is handed back alongside so the caller can surface it.
pub async fn fetch_or_empty<S: TableSource>(source: &S) -> (RemoteTable, Option<FetchError>) {
    match source.fetch().await {
        Ok(table) => (table, None),
        Err(e) => {
            warn!("[FETCH] ⚠ {}", e);
            (RemoteTable::empty(), Some(e))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// replays a fixed list of results, repeating the last one
    pub(crate) struct ScriptedSource {
        script: std::sync::Mutex<VecDeque<Result<RemoteTable, FetchError>>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: Vec<Result<RemoteTable, FetchError>>) -> Self {
            Self {
                script: std::sync::Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TableSource for ScriptedSource {
        async fn fetch(&self) -> Result<RemoteTable, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or_else(|| Ok(RemoteTable::empty()))
            }
        }
    }

    fn table(ts: &str, t: f64, h: f64) -> RemoteTable {
        RemoteTable::new(vec![Reading::new(ts, t, h)])
    }

    #[test]
    fn csv_parses_rows_in_order() {
        let csv = "timestamp,temperature,humidity\n\
                   2024-01-01 10:00:00,20.5,50\n\
                   2024-01-01 10:01:00,21,51.25\n";
        let table = parse_csv(csv).unwrap();
        assert_eq!(
            table.rows,
            vec![
                Reading::new("2024-01-01 10:00:00", 20.5, 50.0),
                Reading::new("2024-01-01 10:01:00", 21.0, 51.25),
            ]
        );
    }

    #[test]
    fn csv_accepts_reordered_and_extra_columns() {
        let csv = "humidity, device ,timestamp,temperature\n40,abc,t0,19.5\n";
        let table = parse_csv(csv).unwrap();
        assert_eq!(table.rows, vec![Reading::new("t0", 19.5, 40.0)]);
    }

    #[test]
    fn csv_header_only_is_an_empty_table() {
        let table = parse_csv("timestamp,temperature,humidity\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn csv_missing_columns_is_schema_mismatch() {
        let err = parse_csv("timestamp,temperature\nt0,20\n").unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["humidity".into()]));

        let err = parse_csv("time,temp,hum\nt0,20,50\n").unwrap_err();
        assert_eq!(
            err,
            FetchError::SchemaMismatch(vec![
                "timestamp".into(),
                "temperature".into(),
                "humidity".into()
            ])
        );
    }

    #[test]
    fn csv_bad_number_rejects_whole_table() {
        let csv = "timestamp,temperature,humidity\nt0,20,50\nt1,warm,51\n";
        assert!(matches!(parse_csv(csv), Err(FetchError::Parse(_))));
    }

    #[test]
    fn csv_ragged_row_is_parse_error() {
        let csv = "timestamp,temperature,humidity\nt0,20\n";
        assert!(matches!(parse_csv(csv), Err(FetchError::Parse(_))));
    }

    #[test]
    fn json_sensors_object_becomes_one_row() {
        let body = r#"{"timestamp":"2024-01-01T10:00:00Z","sensors":{"temperature":22.5,"humidity":45}}"#;
        let table = parse_json(body).unwrap();
        assert_eq!(table.rows, vec![Reading::new("2024-01-01T10:00:00Z", 22.5, 45.0)]);
    }

    #[test]
    fn json_sensors_without_timestamp_is_accepted() {
        let table = parse_json(r#"{"sensors":{"temperature":1,"humidity":2}}"#).unwrap();
        assert_eq!(table.rows, vec![Reading::new("", 1.0, 2.0)]);
    }

    #[test]
    fn json_array_of_rows() {
        let body = r#"[{"timestamp":"t0","temperature":20,"humidity":50},
                       {"timestamp":"t1","temperature":21,"humidity":51}]"#;
        assert_eq!(parse_json(body).unwrap().len(), 2);
    }

    #[test]
    fn json_missing_fields_is_schema_mismatch() {
        let err = parse_json(r#"{"sensors":{"temperature":20}}"#).unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["humidity".into()]));

        let err = parse_json(r#"{"status":"ok"}"#).unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["sensors".into()]));

        let err = parse_json(r#"[{"temperature":20,"humidity":50}]"#).unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["timestamp".into()]));

        let err = parse_json(r#"[{"timestamp":null,"temperature":1,"humidity":2}]"#).unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["timestamp".into()]));

        let err = parse_json(r#"[{"timestamp":"t0","temperature":null,"humidity":2}]"#).unwrap_err();
        assert_eq!(err, FetchError::SchemaMismatch(vec!["temperature".into()]));
    }

    #[test]
    fn json_malformed_or_non_numeric_is_parse_error() {
        assert!(matches!(parse_json("{not json"), Err(FetchError::Parse(_))));
        assert!(matches!(
            parse_json(r#"{"sensors":{"temperature":"hot","humidity":50}}"#),
            Err(FetchError::Parse(_))
        ));
        assert!(matches!(parse_json("42"), Err(FetchError::Parse(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_until_ttl_then_refetches() {
        let ttl = Duration::from_secs(60);
        let source = Arc::new(ScriptedSource::new(vec![
            Ok(table("A", 20.0, 50.0)),
            Ok(table("B", 21.0, 51.0)),
        ]));
        let cached = CachedSource::new(source.clone(), ttl);

        let first = cached.fetch().await.unwrap();
        assert_eq!(first.rows[0].timestamp, "A");
        assert_eq!(source.calls(), 1);

        tokio::time::advance(ttl - Duration::from_secs(1)).await;
        let second = cached.fetch().await.unwrap();
        assert_eq!(second.rows[0].timestamp, "A");
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = cached.fetch().await.unwrap();
        assert_eq!(third.rows[0].timestamp, "B");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_does_not_keep_failures() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(FetchError::Network("timed out".into())),
            Ok(table("A", 20.0, 50.0)),
        ]));
        let cached = CachedSource::new(source.clone(), Duration::from_secs(300));

        assert!(matches!(cached.fetch().await, Err(FetchError::Network(_))));
        assert_eq!(cached.fetch().await.unwrap().rows[0].timestamp, "A");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_always_refetches() {
        let source = Arc::new(ScriptedSource::new(vec![Ok(table("A", 1.0, 1.0))]));
        let cached = CachedSource::new(source.clone(), Duration::ZERO);
        cached.fetch().await.unwrap();
        cached.fetch().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn fetch_or_empty_substitutes_empty_table() {
        let source = ScriptedSource::new(vec![Err(FetchError::SchemaMismatch(vec![
            "humidity".into(),
        ]))]);
        let (table, err) = fetch_or_empty(&source).await;
        assert!(table.is_empty());
        assert_eq!(err, Some(FetchError::SchemaMismatch(vec!["humidity".into()])));
    }
}
