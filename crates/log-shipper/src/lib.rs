// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Log Shipper
//!
//! Buffered, batched delivery of structured log records to an HTTP JSON
//! ingestion endpoint, with request-scoped correlation identifiers.
//!
//! ## Overview
//!
//! - [`logger`]: dual-sink entry points (console + shipping buffer) and the
//!   `tracing` layer feeding them
//! - [`coordinator`]: the flush cycle state machine with bounded linear
//!   backoff retries
//! - [`buffer`]: FIFO buffer with pinned in-flight prefix and overflow policy
//! - [`sender`]: one POST per batch to `{node}/api/{org}/{stream}/_json`
//! - [`correlator`]: task-local correlation ids, shipped as `trace_id`
//!
//! ## Usage
//!
//! ```rust,ignore
//! #[tokio::main]
//! async fn main() -> Result<(), log_shipper::ShipperError> {
//!     let guard = log_shipper::init()?;
//!
//!     log_shipper::correlator::begin(async {
//!         tracing::info!(symbol = "USD-INR", "rate fetched");
//!     })
//!     .await;
//!
//!     guard.shutdown().await
//! }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub mod buffer;
pub mod config;
pub mod console;
pub mod constants;
pub mod coordinator;
pub mod correlator;
pub mod error;
pub mod formatter;
pub mod http;
pub mod logger;
pub mod record;
pub mod sender;

pub use config::ShipperConfig;
pub use console::ConsoleSink;
pub use coordinator::{FlushState, ShipperHandle};
pub use correlator::CorrelationId;
pub use error::{BufferError, ConfigError, SendError, ShipperError};
pub use logger::{DualSinkLayer, DualSinkLogger};
pub use record::{Level, LogRecord};

/// Installs the process-wide subscriber from environment configuration and
/// starts the flush coordinator on the current tokio runtime.
///
/// # Errors
///
/// See [`init_with`].
pub fn init() -> Result<ShipperGuard, ShipperError> {
    init_with(ShipperConfig::load_env(), ConsoleSink::stdout())
}

/// Like [`init`] with explicit configuration and console sink.
///
/// An unusable shipping configuration is not an error: it is reported once
/// on the console and logging continues console-only.
///
/// # Errors
///
/// [`ShipperError::NoRuntime`] outside of a tokio runtime,
/// [`ShipperError::Subscriber`] if a global subscriber is already installed.
pub fn init_with(
    config: ShipperConfig,
    console: ConsoleSink,
) -> Result<ShipperGuard, ShipperError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| ShipperError::NoRuntime)?;

    let level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let env_filter = format!("h2=off,hyper=off,rustls=off,reqwest=off,{level}");
    let filter =
        EnvFilter::try_new(env_filter).map_err(|e| ShipperError::Subscriber(e.to_string()))?;

    let (logger, service) = DualSinkLogger::from_config(&config, console);
    let logger = Arc::new(logger);

    tracing_subscriber::registry()
        .with(filter)
        .with(DualSinkLayer::new(Arc::clone(&logger)))
        .try_init()
        .map_err(|e| ShipperError::Subscriber(e.to_string()))?;

    let task = service.map(|service| runtime.spawn(service.run()));
    debug!("LOGS | Logging subsystem enabled");

    Ok(ShipperGuard { logger, task })
}

/// Keeps the flush coordinator alive. Call [`ShipperGuard::shutdown`] before
/// the process exits so buffered records are delivered.
#[derive(Debug)]
pub struct ShipperGuard {
    logger: Arc<DualSinkLogger>,
    task: Option<JoinHandle<()>>,
}

impl ShipperGuard {
    #[must_use]
    pub fn logger(&self) -> &Arc<DualSinkLogger> {
        &self.logger
    }

    /// `None` when shipping is disabled.
    #[must_use]
    pub fn handle(&self) -> Option<&ShipperHandle> {
        self.logger.shipper()
    }

    /// Flushes every buffered record and stops the coordinator.
    ///
    /// # Errors
    ///
    /// [`ShipperError::NotRunning`] if the coordinator had already stopped,
    /// [`ShipperError::Runtime`] if its task panicked.
    pub async fn shutdown(self) -> Result<(), ShipperError> {
        if let Some(handle) = self.logger.shipper() {
            handle.shutdown().await?;
        }
        if let Some(task) = self.task {
            task.await
                .map_err(|e| ShipperError::Runtime(e.to_string()))?;
        }
        Ok(())
    }
}
