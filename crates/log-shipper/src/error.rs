// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the log shipping pipeline.
//!
//! None of these ever reach a log call site: the [`DualSinkLogger`] swallows
//! them and the flush coordinator contains every transport failure.
//!
//! [`DualSinkLogger`]: crate::logger::DualSinkLogger

use reqwest::StatusCode;

/// A single delivery attempt to the ingestion endpoint failed.
///
/// Every variant is treated as recoverable by the coordinator and retried
/// up to the configured bound.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to serialize batch: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ingestion endpoint responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Errors raised by the shipping buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The bounded buffer had no room for the incoming record.
    #[error("shipping buffer is full ({capacity} records)")]
    Full { capacity: usize },

    /// A prefix removal asked for more records than the buffer holds.
    #[error("cannot remove {requested} records from a buffer holding {len}")]
    InvalidCount { requested: usize, len: usize },

    /// The coordinator has shut down and no longer accepts records.
    #[error("shipping buffer is closed")]
    Closed,
}

/// The transport cannot be built from the supplied configuration.
///
/// Fatal to remote shipping only; the logger falls back to the console.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("ingestion endpoint is not configured (set OPENOBSERVE_URL)")]
    MissingEndpoint,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors surfaced by the shipper lifecycle (`init`, `flush`, `shutdown`).
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("log shipper is not running")]
    NotRunning,

    #[error("no tokio runtime available to run the flush coordinator")]
    NoRuntime,

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(String),

    #[error("flush coordinator task failed: {0}")]
    Runtime(String),
}
