//! Log domain: accumulated pulse readings, wire decoding, series state, rate.

pub mod convert;
pub mod rate;
pub mod state;
pub mod wire;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::display_reading;

pub use rate::{compute_rate, compute_rate_with, RateScale};
pub use state::{IngestOutcome, ListenerId, SeriesModel};
pub use wire::InboundMessage;

/// One reading from the collector: the accumulated value at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp in seconds.
    pub time: i64,
    #[serde(rename = "accumulatedValue")]
    pub accumulated_value: f64,
}

impl LogEntry {
    pub fn new(time: i64, accumulated_value: f64) -> Self {
        Self {
            time,
            accumulated_value,
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.time, 0)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.datetime() {
            Some(at) => write!(
                f,
                "{} @ {}",
                display_reading(self.accumulated_value),
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            None => write!(f, "{} @ t={}", display_reading(self.accumulated_value), self.time),
        }
    }
}

/// A chart point as render sinks expect it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unix timestamp in milliseconds.
    pub x: i64,
    pub y: f64,
}

impl From<&LogEntry> for Point {
    fn from(entry: &LogEntry) -> Self {
        Self {
            x: entry.time.saturating_mul(1000),
            y: entry.accumulated_value,
        }
    }
}

impl From<LogEntry> for Point {
    fn from(entry: LogEntry) -> Self {
        Point::from(&entry)
    }
}

/// Convert an ordered series into chart points, preserving order.
pub fn to_points(entries: &[LogEntry]) -> Vec<Point> {
    entries.iter().map(Point::from).collect()
}
