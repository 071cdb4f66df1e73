// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::time::Duration;

use crate::buffer::OverflowPolicy;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_ENVIRONMENT, DEFAULT_LOG_LEVEL, DEFAULT_MAX_BUFFERED_RECORDS,
    DEFAULT_MAX_RETRIES, DEFAULT_ORGANIZATION, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_BASE_DELAY,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::error::ConfigError;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration of the remote log transport.
#[derive(Clone)]
pub struct ShipperConfig {
    /// Base URL of the ingestion node (e.g. `https://logs.example.com`)
    pub node: String,
    /// Organization segment of the ingestion path
    pub organization: String,
    /// Stream segment of the ingestion path, usually one per deployment environment
    pub stream: String,
    /// Sent as `Authorization: Basic <auth_token>`
    pub auth_token: String,
    /// Buffered record count that triggers a flush; also the maximum batch length
    pub batch_size: usize,
    /// Retries after the first failed attempt before a batch is dropped
    pub max_retries: u32,
    /// Retry `k` waits `k * base_delay`
    pub base_delay: Duration,
    /// Timeout of a single ingestion request
    pub timeout: Duration,
    /// Buffer capacity; `None` leaves the buffer unbounded
    pub max_buffered_records: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    /// Upper bound on the final drain at shutdown; records still buffered
    /// when it expires are discarded
    pub shutdown_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            node: String::new(),
            organization: DEFAULT_ORGANIZATION.to_string(),
            stream: default_stream(DEFAULT_ENVIRONMENT),
            auth_token: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_buffered_records: Some(DEFAULT_MAX_BUFFERED_RECORDS),
            overflow_policy: OverflowPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            https_proxy: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

// The auth token must never end up in a log line.
impl fmt::Debug for ShipperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShipperConfig")
            .field("node", &self.node)
            .field("organization", &self.organization)
            .field("stream", &self.stream)
            .field("auth_token", &"<redacted>")
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("timeout", &self.timeout)
            .field("max_buffered_records", &self.max_buffered_records)
            .field("overflow_policy", &self.overflow_policy)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("https_proxy", &self.https_proxy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn default_stream(environment: &str) -> String {
    format!("{environment}-logs")
}

impl ShipperConfig {
    /// Create configuration from environment variables and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the resulting configuration is unusable,
    /// most commonly because `OPENOBSERVE_URL` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::load_env();
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from environment variables without validating it.
    #[must_use]
    pub fn load_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unparsable numeric
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let node = lookup("OPENOBSERVE_URL").unwrap_or_default();
        let auth_token = lookup("OPENOBSERVE_TOKEN").unwrap_or_default();
        let organization = lookup("OPENOBSERVE_ORGANIZATION").unwrap_or(defaults.organization);
        let stream = lookup("OPENOBSERVE_STREAM").unwrap_or_else(|| {
            let environment = lookup("APP_ENV")
                .or_else(|| lookup("NODE_ENV"))
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
            default_stream(&environment)
        });
        let batch_size = lookup("OPENOBSERVE_BATCH_SIZE")
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(defaults.batch_size);
        let max_retries = lookup("OPENOBSERVE_MAX_RETRIES")
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);
        let base_delay = lookup("OPENOBSERVE_RETRY_DELAY_MS")
            .and_then(|val| val.parse::<u64>().ok())
            .map_or(defaults.base_delay, Duration::from_millis);
        let timeout = lookup("OPENOBSERVE_TIMEOUT_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .map_or(defaults.timeout, Duration::from_secs);
        // 0 disables the bound.
        let max_buffered_records = match lookup("OPENOBSERVE_MAX_BUFFERED")
            .and_then(|val| val.parse::<usize>().ok())
        {
            Some(0) => None,
            Some(max) => Some(max),
            None => defaults.max_buffered_records,
        };
        let overflow_policy = lookup("OPENOBSERVE_OVERFLOW_POLICY")
            .and_then(|val| val.parse::<OverflowPolicy>().ok())
            .unwrap_or(defaults.overflow_policy);
        let shutdown_timeout = lookup("OPENOBSERVE_SHUTDOWN_TIMEOUT_SECS")
            .and_then(|val| val.parse::<u64>().ok())
            .map_or(defaults.shutdown_timeout, Duration::from_secs);
        let https_proxy = lookup("OPENOBSERVE_PROXY_HTTPS").or_else(|| lookup("HTTPS_PROXY"));
        let log_level = lookup("LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        Self {
            node,
            organization,
            stream,
            auth_token,
            batch_size,
            max_retries,
            base_delay,
            timeout,
            max_buffered_records,
            overflow_policy,
            shutdown_timeout,
            https_proxy,
            log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEndpoint`] when no node is configured and
    /// [`ConfigError::Invalid`] for any other unusable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_transport()?;

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Validate only the fields remote shipping depends on. The log level
    /// filter is not one of them.
    ///
    /// # Errors
    ///
    /// Same as [`ShipperConfig::validate`], minus the log level check.
    pub fn validate_transport(&self) -> Result<(), ConfigError> {
        let node = self.node.trim();
        if node.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if !(node.starts_with("http://") || node.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "ingestion node '{node}' must start with http:// or https://"
            )));
        }

        if self.organization.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "OPENOBSERVE_ORGANIZATION cannot be empty".to_string(),
            ));
        }

        if self.stream.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "OPENOBSERVE_STREAM cannot be empty".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch size must be greater than 0".to_string(),
            ));
        }

        // A full buffer must still be able to reach the flush threshold.
        if let Some(max) = self.max_buffered_records {
            if max < self.batch_size {
                return Err(ConfigError::Invalid(format!(
                    "OPENOBSERVE_MAX_BUFFERED ({max}) must be at least the batch size ({})",
                    self.batch_size
                )));
            }
        }

        Ok(())
    }

    /// Full ingestion URL: `{node}/api/{organization}/{stream}/_json`.
    #[must_use]
    pub fn ingestion_url(&self) -> String {
        format!(
            "{}/api/{}/{}/_json",
            self.node.trim().trim_end_matches('/'),
            self.organization,
            self.stream
        )
    }
}
