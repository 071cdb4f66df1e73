// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery of one batch to the ingestion endpoint.
//!
//! A [`BatchSender`] performs exactly one attempt per call; retries and
//! backoff belong to the flush coordinator.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use crate::config::ShipperConfig;
use crate::error::{ConfigError, SendError};
use crate::http::build_client;
use crate::record::LogRecord;

#[async_trait]
pub trait BatchSender: Send + Sync {
    /// Sends `batch` as a single request.
    ///
    /// # Errors
    ///
    /// Any transport failure or non-2xx response.
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError>;
}

/// POSTs batches as a JSON array to `{node}/api/{organization}/{stream}/_json`.
#[derive(Debug, Clone)]
pub struct HttpBatchSender {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl HttpBatchSender {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate, the token is not
    /// a valid header value, or the HTTP client cannot be built.
    pub fn new(config: &ShipperConfig) -> Result<Self, ConfigError> {
        config.validate_transport()?;
        let client = build_client(config.https_proxy.as_deref(), config.timeout)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Self::with_client(config, client)
    }

    /// Uses an existing client instead of building one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the auth token cannot be used as a
    /// header value.
    pub fn with_client(
        config: &ShipperConfig,
        client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Basic {}", config.auth_token)).map_err(
            |_| ConfigError::Invalid("auth token is not a valid header value".to_string()),
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            url: config.ingestion_url(),
            headers,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl BatchSender for HttpBatchSender {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError> {
        let body = serde_json::to_vec(batch)?;
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("LOGS | Delivered batch of {} records", batch.len());
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendError::Status { status, body })
    }
}
