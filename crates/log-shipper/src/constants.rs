// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Defaults for the shipping pipeline.
//!
//! Every value here can be overridden through [`ShipperConfig`]; these are
//! the values used when the corresponding environment variable is absent.
//!
//! [`ShipperConfig`]: crate::config::ShipperConfig

use std::time::Duration;

/// Number of buffered records that triggers a flush cycle.
///
/// A cycle keeps draining in chunks of this size until fewer than this many
/// records remain.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Number of retries after the first failed attempt before a batch is dropped.
///
/// A batch is therefore sent at most `DEFAULT_MAX_RETRIES + 1` times.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay. Retry `k` waits `k * DEFAULT_RETRY_BASE_DELAY`.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Network-layer timeout for a single POST to the ingestion endpoint.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of records held in the shipping buffer.
///
/// # Value: 50,000 records
///
/// Assuming an average record of ~1KB this bounds the buffer at ~50MB
/// while the endpoint is unreachable. Beyond it the overflow policy applies.
pub const DEFAULT_MAX_BUFFERED_RECORDS: usize = 50_000;

/// Upper bound on the final drain performed by `shutdown()`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_ORGANIZATION: &str = "default";

pub const DEFAULT_ENVIRONMENT: &str = "development";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Field names owned by the wire format. Structured fields using one of
/// these names are not forwarded.
pub(crate) const RESERVED_WIRE_FIELDS: [&str; 4] = ["level", "message", "_timestamp", "trace_id"];
