// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Console rendering of a [`LogRecord`].
//!
//! # Format
//!
//! ```text
//! <correlation id> <level>: <message> {key=value ...}
//! ```
//!
//! The id is left empty (the leading space is kept) for records emitted
//! outside of a correlation scope:
//!
//! ```text
//! req-42 info: rate fetched symbol=USD-INR
//!  warn: scrape retry scheduled attempt=2
//! ```

use std::fmt::Write;

use serde_json::Value;

use crate::record::LogRecord;

#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl Formatter {
    #[must_use]
    pub fn format(&self, record: &LogRecord) -> String {
        let id = record
            .correlation_id()
            .map(|id| id.as_str())
            .unwrap_or_default();
        let mut line = format!("{id} {}: {}", record.level(), record.message());
        for (key, value) in record.fields() {
            // Strings are written bare, everything else as JSON.
            let _ = match value {
                Value::String(s) => write!(line, " {key}={s}"),
                other => write!(line, " {key}={other}"),
            };
        }
        line
    }
}
