// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dual-sink logging entry points.
//!
//! Every record goes to the console synchronously and, when a shipper is
//! attached, into the shipping buffer. Logging never fails and never
//! suspends the caller.
//!
//! Application code normally logs through `tracing`; [`DualSinkLayer`]
//! converts each event into a [`LogRecord`]:
//!
//! ```text
//! tracing::info!(symbol = "USD-INR", "rate fetched")
//!     -> {"level":"info","message":"rate fetched","symbol":"USD-INR",...}
//! ```
//!
//! Events emitted by this crate or by the HTTP stack underneath it are
//! written to the console only. Shipping them would feed transport
//! diagnostics back into the transport.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::ShipperConfig;
use crate::console::ConsoleSink;
use crate::coordinator::{CoordinatorConfig, FlushService, ShipperHandle};
use crate::record::{Level, LogRecord};
use crate::sender::HttpBatchSender;

/// Targets whose events never enter the shipping buffer.
const CONSOLE_ONLY_TARGETS: [&str; 5] = [
    env!("CARGO_CRATE_NAME"),
    "hyper",
    "h2",
    "reqwest",
    "rustls",
];

#[derive(Debug)]
pub struct DualSinkLogger {
    console: ConsoleSink,
    shipper: Option<ShipperHandle>,
}

impl DualSinkLogger {
    #[must_use]
    pub fn new(console: ConsoleSink, shipper: Option<ShipperHandle>) -> Self {
        Self { console, shipper }
    }

    /// Builds the logger and, when `config` is usable, the flush service that
    /// must be spawned to ship its records. An unusable configuration is
    /// reported once on the console and leaves the logger console-only.
    #[must_use]
    pub fn from_config(
        config: &ShipperConfig,
        console: ConsoleSink,
    ) -> (Self, Option<FlushService>) {
        match HttpBatchSender::new(config) {
            Ok(sender) => {
                let (service, handle) =
                    FlushService::new(CoordinatorConfig::from(config), Arc::new(sender));
                (Self::new(console, Some(handle)), Some(service))
            }
            Err(e) => {
                let logger = Self::new(console, None);
                logger.diagnostic(
                    Level::Warn,
                    format!("LOGS | Remote log shipping disabled: {e}"),
                );
                (logger, None)
            }
        }
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.log_record(LogRecord::new(level, message));
    }

    pub fn log_record(&self, record: LogRecord) {
        self.console.write(&record);
        if let Some(shipper) = &self.shipper {
            // Overflow is counted by the buffer; a closed shipper only means
            // the process is shutting down.
            let _ = shipper.enqueue(record);
        }
    }

    /// Console-only output for the transport's own diagnostics.
    pub fn diagnostic(&self, level: Level, message: impl Into<String>) {
        self.console.write(&LogRecord::new(level, message));
    }

    #[must_use]
    pub fn shipper(&self) -> Option<&ShipperHandle> {
        self.shipper.as_ref()
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }
}

/// `tracing` layer forwarding events to a [`DualSinkLogger`].
#[derive(Debug, Clone)]
pub struct DualSinkLayer {
    logger: Arc<DualSinkLogger>,
}

impl DualSinkLayer {
    #[must_use]
    pub fn new(logger: Arc<DualSinkLogger>) -> Self {
        Self { logger }
    }
}

fn is_console_only(target: &str) -> bool {
    CONSOLE_ONLY_TARGETS.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S> Layer<S> for DualSinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord::new(Level::from(metadata.level()), visitor.message)
            .with_fields(visitor.fields);
        if is_console_only(metadata.target()) {
            self.logger.console.write(&record);
        } else {
            self.logger.log_record(record);
        }
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: BTreeMap<String, Value>,
}

impl RecordVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::from(format!("{value:?}")));
    }
}
