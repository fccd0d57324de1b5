use chrono::{DateTime, Local};
use std::fmt;

pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S";

/// A single line received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Local wall-clock time, second precision
    pub timestamp: String,
    /// Line text with trailing whitespace removed
    pub line: String,
}

impl LogRecord {
    pub fn new(timestamp: String, line: String) -> Self {
        Self { timestamp, line }
    }

    pub fn at(time: DateTime<Local>, line: String) -> Self {
        Self::new(time.format(TIMESTAMP_FORMAT).to_string(), line)
    }

    pub fn now(line: String) -> Self {
        Self::at(Local::now(), line)
    }
}

/// Renders the on-disk form, `HH:MM:SS <line>`.
impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp, self.line)
    }
}
