use crate::error::EventsError;
use chrono::{DateTime, Utc};
use core_types::{ChartPoint, SeriesType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enum representing the severity of a log message for structured logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A structured log message to be sent over the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogMessage {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

/// One point appended to one series, with enough metadata for a listener to
/// create the chart and series on first sight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartUpdate {
    pub chart: String,
    pub series: String,
    pub index: usize,
    pub series_type: SeriesType,
    pub unit: String,
    pub point: ChartPoint,
}

/// The top-level stream message enum.
///
/// Serialized as `{"type": "...", "payload": {...}}`, e.g.
/// `{"type": "ChartUpdate", "payload": {"chart": "Strategy Equity", ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ResultMessage {
    /// A single sampled point.
    ChartUpdate(ChartUpdate),
    /// The flat, display-ready runtime statistics.
    RuntimeStatistics(BTreeMap<String, String>),
    /// The summary of a statistics run.
    Statistics(BTreeMap<String, String>),
    /// A structured log message.
    Log(LogMessage),
}

impl ResultMessage {
    /// Renders the message as a single JSON line.
    pub fn to_json(&self) -> Result<String, EventsError> {
        Ok(serde_json::to_string(self)?)
    }
}
