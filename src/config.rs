//! Run configuration.
//!
//! Defaults target SOLUSDT perpetual depth on Binance futures at 100ms,
//! stopping after 20000 updates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::{StopCondition, DEFAULT_PROGRESS_INTERVAL};
use crate::error::{Error, Result};

pub const DEFAULT_REST_URL: &str = "https://fapi.binance.com/fapi/v1/depth";
pub const DEFAULT_WS_URL: &str = "wss://fstream.binance.com/ws";

/// Shape of the exported history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryLayout {
    /// One row per record with list columns for depth.
    #[default]
    Book,
    /// One row per resting level per record.
    Levels,
}

impl std::str::FromStr for HistoryLayout {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "book" => Ok(HistoryLayout::Book),
            "levels" => Ok(HistoryLayout::Levels),
            other => Err(Error::Config(format!("unknown history layout: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Instrument symbol, e.g. `SOLUSDT`.
    pub symbol: String,
    /// REST depth endpoint (without query string).
    pub rest_url: String,
    /// WebSocket base URL; the stream name is appended as a path segment.
    pub ws_url: String,
    /// Levels requested in the snapshot.
    pub depth_limit: u32,
    /// Diff push interval in milliseconds.
    pub update_speed_ms: u32,
    /// Stop after this many applied diffs. `None` runs until cancelled.
    pub max_events: Option<u64>,
    pub output: PathBuf,
    pub layout: HistoryLayout,
    /// Records buffered before a parquet row group is written.
    pub batch_rows: usize,
    /// Log progress every N applied diffs (0 disables).
    pub progress_interval: u64,
    /// Transport -> engine queue depth.
    pub channel_capacity: usize,
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            symbol: "SOLUSDT".to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            depth_limit: 1000,
            update_speed_ms: 100,
            max_events: Some(20_000),
            output: PathBuf::from("order_book.parquet"),
            layout: HistoryLayout::Book,
            batch_rows: 1024,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            channel_capacity: 1024,
            request_timeout_secs: 10,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Config(format!("invalid session config: {e}")))
    }

    /// `<symbol>@depth@<speed>ms`, lowercase as the venue expects.
    pub fn stream_name(&self) -> String {
        format!(
            "{}@depth@{}ms",
            self.symbol.to_lowercase(),
            self.update_speed_ms
        )
    }

    pub fn snapshot_url(&self) -> String {
        format!(
            "{}?symbol={}&limit={}",
            self.rest_url,
            self.symbol.to_uppercase(),
            self.depth_limit
        )
    }

    pub fn stream_url(&self) -> String {
        format!("{}/{}", self.ws_url.trim_end_matches('/'), self.stream_name())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stop_condition(&self) -> StopCondition {
        StopCondition {
            max_events: self.max_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_collector() {
        let config = SessionConfig::default();
        assert_eq!(config.stream_name(), "solusdt@depth@100ms");
        assert_eq!(
            config.snapshot_url(),
            "https://fapi.binance.com/fapi/v1/depth?symbol=SOLUSDT&limit=1000"
        );
        assert_eq!(
            config.stream_url(),
            "wss://fstream.binance.com/ws/solusdt@depth@100ms"
        );
        assert_eq!(config.stop_condition(), StopCondition::after_events(20_000));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_slice(
            br#"{"symbol": "btcusdt", "max_events": null, "layout": "levels"}"#,
        )
        .unwrap();
        assert_eq!(config.symbol, "btcusdt");
        assert_eq!(config.max_events, None);
        assert_eq!(config.layout, HistoryLayout::Levels);
        assert_eq!(config.depth_limit, 1000);
        assert_eq!(config.stream_name(), "btcusdt@depth@100ms");
    }

    #[test]
    fn rejects_unknown_layout() {
        assert!("Levels".parse::<HistoryLayout>().is_ok());
        let err = "csv".parse::<HistoryLayout>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_transport());

        let err = SessionConfig::from_json_slice(br#"{"layout": "csv"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn bad_config_file_is_not_a_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = SessionConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("invalid session config")));
        assert!(!err.is_transport());

        let missing = SessionConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }
}
