//! # Log Records

use crate::error::Error;
use std::{fmt, str::FromStr};

/// A single structured event submitted by a producer.
///
/// A record is immutable once built. Its [`Display`](fmt::Display) form is the
/// persisted line: `timestamp,eventType,arg0,arg1,...`.
///
/// Fields are joined with commas and **not escaped**. An event type or argument
/// containing a comma (or a newline) produces a line that cannot be split back
/// into the same fields. Callers must keep both free of delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: i64,
    event_type: String,
    args: Vec<String>,
}

impl LogRecord {
    /// Builds a record. The timestamp unit is whatever the caller uses.
    pub fn new<E, I, S>(timestamp: i64, event_type: E, args: I) -> Self
    where
        E: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        LogRecord {
            timestamp,
            event_type: event_type.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for LogRecord {
    /// Renders `timestamp,eventType,` followed by the comma-joined args.
    ///
    /// A record without args keeps the trailing comma (`42,start,`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.timestamp, self.event_type, self.args.join(","))
    }
}

impl FromStr for LogRecord {
    type Err = Error;

    /// Splits a persisted line back into a record.
    ///
    /// The first field must be an integer timestamp and the second the event type.
    /// Everything after the second comma is split into args; an empty remainder
    /// means the record had no args.
    fn from_str(line: &str) -> Result<Self, Error> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let mut fields = line.splitn(3, ',');

        let timestamp = fields
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .ok_or_else(|| Error::MalformedRecord(line.to_string()))?;
        let event_type = fields
            .next()
            .ok_or_else(|| Error::MalformedRecord(line.to_string()))?;
        let args = match fields.next() {
            None | Some("") => Vec::new(),
            Some(rest) => rest.split(',').map(str::to_string).collect(),
        };

        Ok(LogRecord {
            timestamp,
            event_type: event_type.to_string(),
            args,
        })
    }
}
