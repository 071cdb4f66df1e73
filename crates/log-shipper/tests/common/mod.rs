// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use log_shipper::sender::BatchSender;
use log_shipper::{LogRecord, SendError, ShipperConfig};
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Console writer backed by a shared in-memory buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sender that accepts every batch and keeps its wire representation.
#[derive(Debug, Default)]
pub struct RecordingSender {
    batches: Mutex<Vec<Vec<Value>>>,
}

impl RecordingSender {
    pub fn batches(&self) -> Vec<Vec<Value>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<Value> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl BatchSender for RecordingSender {
    async fn send(&self, batch: &[LogRecord]) -> Result<(), SendError> {
        let values = batch
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.batches.lock().unwrap().push(values);
        Ok(())
    }
}

/// Configuration pointing at a mock ingestion node.
pub fn mock_config(node: String, batch_size: usize) -> ShipperConfig {
    ShipperConfig {
        node,
        organization: "acme".to_string(),
        stream: "dev-logs".to_string(),
        auth_token: "dXNlcjpwYXNz".to_string(),
        batch_size,
        max_retries: 1,
        base_delay: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}
