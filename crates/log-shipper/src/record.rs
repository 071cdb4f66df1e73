// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log records and their wire representation.
//!
//! A [`LogRecord`] is created at the call site and never mutated afterwards.
//! Its `Serialize` impl is the ingestion wire format:
//!
//! ```json
//! {"level":"info","message":"rate fetched","_timestamp":"2024-05-01T10:00:00.000Z","trace_id":"req-42","symbol":"USD-INR"}
//! ```
//!
//! `trace_id` is omitted when the record was emitted outside of a
//! correlation scope. Structured fields are flattened after the fixed keys.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::RESERVED_WIRE_FIELDS;
use crate::correlator::{self, CorrelationId};

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    /// `TRACE` has no counterpart on the wire and is shipped as `debug`.
    fn from(level: &tracing::Level) -> Self {
        if *level == tracing::Level::ERROR {
            Level::Error
        } else if *level == tracing::Level::WARN {
            Level::Warn
        } else if *level == tracing::Level::INFO {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// One structured log line awaiting delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    level: Level,
    message: String,
    timestamp: DateTime<Utc>,
    correlation_id: Option<CorrelationId>,
    fields: BTreeMap<String, Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time and the correlation
    /// id of the calling operation, if any.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            correlation_id: correlator::current_id(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: BTreeMap<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: Option<CorrelationId>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("message", &self.message)?;
        map.serialize_entry(
            "_timestamp",
            &self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        if let Some(id) = &self.correlation_id {
            map.serialize_entry("trace_id", id)?;
        }
        for (key, value) in &self.fields {
            if RESERVED_WIRE_FIELDS.contains(&key.as_str()) {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_wire_format_renames_timestamp_and_attaches_trace_id() {
        let record = LogRecord::new(Level::Info, "rate fetched")
            .with_timestamp(fixed_time())
            .with_correlation_id(Some(CorrelationId::from("req-42")));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "level": "info",
                "message": "rate fetched",
                "_timestamp": "2024-05-01T10:00:00.000Z",
                "trace_id": "req-42",
            })
        );
    }

    #[test]
    fn test_wire_format_omits_missing_trace_id() {
        let record = LogRecord::new(Level::Warn, "no scope").with_timestamp(fixed_time());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("trace_id").is_none());
        assert!(value.get("timestamp").is_none());
        assert_eq!(value["level"], "warn");
    }

    #[test]
    fn test_wire_format_flattens_fields_and_skips_reserved() {
        let mut fields = BTreeMap::new();
        fields.insert("symbol".to_string(), json!("USD-INR"));
        fields.insert("level".to_string(), json!("spoofed"));
        let record = LogRecord::new(Level::Error, "scrape failed")
            .with_timestamp(fixed_time())
            .with_fields(fields);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["symbol"], "USD-INR");
        assert_eq!(value["level"], "error");
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(&tracing::Level::ERROR), Level::Error);
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(&tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(&tracing::Level::DEBUG), Level::Debug);
        assert_eq!(Level::from(&tracing::Level::TRACE), Level::Debug);
    }

    #[test]
    fn test_new_record_picks_up_correlation_scope() {
        let record = correlator::sync_scope(CorrelationId::from("op-7"), || {
            LogRecord::new(Level::Debug, "inside")
        });
        assert_eq!(record.correlation_id().unwrap().as_str(), "op-7");
        assert!(LogRecord::new(Level::Debug, "outside")
            .correlation_id()
            .is_none());
    }
}
