// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io::Write;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter};

use crate::formatter::Formatter;
use crate::record::LogRecord;

/// Synchronous local sink. Every record is written here whatever happens to
/// remote delivery.
#[derive(Debug)]
pub struct ConsoleSink {
    writer: BoxMakeWriter,
    formatter: Formatter,
}

impl ConsoleSink {
    pub fn new<M>(make_writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            writer: BoxMakeWriter::new(make_writer),
            formatter: Formatter,
        }
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout)
    }

    /// Writes one line. Write failures are ignored.
    pub fn write(&self, record: &LogRecord) {
        let line = self.formatter.format(record);
        let mut writer = self.writer.make_writer();
        let _ = writeln!(writer, "{line}");
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdout()
    }
}
