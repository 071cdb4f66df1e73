// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Flush coordinator: drains the shipping buffer in batches, one cycle at a time.
//!
//! # Service and handle
//!
//! [`FlushService::new`] returns the service, which must be spawned on a
//! tokio runtime, and a cloneable [`ShipperHandle`] for producers:
//!
//! ```rust,ignore
//! let (service, handle) = FlushService::new(CoordinatorConfig::default(), sender);
//! tokio::spawn(service.run());
//!
//! handle.enqueue(record)?;
//! handle.shutdown().await?;
//! ```
//!
//! # Cycle state machine
//!
//! ```text
//!   Idle ──(len >= batch_size)──> Flushing(0)
//!   Flushing(k) ──ok──> prefix removed ──(len >= batch_size)──> Flushing(0)
//!                                      └─(otherwise)──────────> Idle
//!   Flushing(k) ──err, k < max_retries──> Backoff(k+1) ──k * base_delay──> Flushing(k+1)
//!   Flushing(k) ──err, k = max_retries──> prefix dropped ──> Idle
//! ```
//!
//! The buffer and the `in_progress` flag share one mutex, so the producer's
//! check-then-set of the trigger is atomic. Only the single service task
//! ever sends, so two cycles can never overlap. Enqueue never suspends.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, warn};

use crate::buffer::{OverflowPolicy, ShippingBuffer};
use crate::config::ShipperConfig;
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_BUFFERED_RECORDS, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_BASE_DELAY, DEFAULT_SHUTDOWN_TIMEOUT,
};
use crate::error::{BufferError, ShipperError};
use crate::record::LogRecord;
use crate::sender::BatchSender;

/// Observable state of the flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushState {
    #[default]
    Idle,
    /// A send of the current batch is outstanding. `attempt` is 0 for the
    /// first try.
    Flushing { attempt: u32 },
    /// Waiting `attempt * base_delay` before retrying the same batch.
    Backoff { attempt: u32 },
}

/// Linear backoff with a bounded number of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// Raised to `batch_size` when smaller, so a full buffer still triggers a cycle.
    pub max_buffered_records: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    pub shutdown_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            max_buffered_records: Some(DEFAULT_MAX_BUFFERED_RECORDS),
            overflow_policy: OverflowPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl From<&ShipperConfig> for CoordinatorConfig {
    fn from(config: &ShipperConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.base_delay,
            },
            max_buffered_records: config.max_buffered_records,
            overflow_policy: config.overflow_policy,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

#[derive(Debug)]
struct Inner {
    buffer: ShippingBuffer,
    in_progress: bool,
    state: FlushState,
    running: bool,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
    trigger: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: FlushState) {
        self.lock().state = state;
    }
}

#[derive(Debug)]
enum Command {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Producer side of the coordinator. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShipperHandle {
    shared: Arc<Shared>,
    batch_size: usize,
    tx: mpsc::UnboundedSender<Command>,
}

impl ShipperHandle {
    /// Appends `record` to the buffer and starts a flush cycle if the buffer
    /// reached the batch size and no cycle is running. Never suspends.
    ///
    /// # Errors
    ///
    /// [`BufferError::Full`] when the bounded buffer rejected the record,
    /// [`BufferError::Closed`] after shutdown.
    pub fn enqueue(&self, record: LogRecord) -> Result<(), BufferError> {
        let start_cycle = {
            let mut inner = self.shared.lock();
            if !inner.running {
                return Err(BufferError::Closed);
            }
            inner.buffer.enqueue(record)?;
            if !inner.in_progress && inner.buffer.len() >= self.batch_size {
                inner.in_progress = true;
                true
            } else {
                false
            }
        };
        if start_cycle {
            self.shared.trigger.notify_one();
        }
        Ok(())
    }

    /// Delivers everything buffered at the time of the call, including a
    /// final partial batch, and waits for it to finish.
    ///
    /// # Errors
    ///
    /// [`ShipperError::NotRunning`] if the service has stopped.
    pub async fn flush(&self) -> Result<(), ShipperError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(tx))
            .map_err(|_| ShipperError::NotRunning)?;
        rx.await.map_err(|_| ShipperError::NotRunning)
    }

    /// Stops accepting records, flushes the buffer and stops the service.
    ///
    /// The final drain is bounded by the configured shutdown timeout; records
    /// still buffered when it expires are discarded.
    ///
    /// # Errors
    ///
    /// [`ShipperError::NotRunning`] if the service had already stopped.
    pub async fn shutdown(&self) -> Result<(), ShipperError> {
        self.shared.lock().running = false;
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(tx))
            .map_err(|_| ShipperError::NotRunning)?;
        rx.await.map_err(|_| ShipperError::NotRunning)
    }

    #[must_use]
    pub fn state(&self) -> FlushState {
        self.shared.lock().state
    }

    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// Records lost to buffer overflow since startup.
    #[must_use]
    pub fn dropped_records(&self) -> u64 {
        self.shared.lock().buffer.dropped()
    }

    #[must_use]
    pub fn is_cycle_in_progress(&self) -> bool {
        self.shared.lock().in_progress
    }
}

/// The single task that owns delivery.
pub struct FlushService {
    shared: Arc<Shared>,
    sender: Arc<dyn BatchSender>,
    batch_size: usize,
    retry: RetryPolicy,
    shutdown_timeout: Duration,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl FlushService {
    #[must_use]
    pub fn new(config: CoordinatorConfig, sender: Arc<dyn BatchSender>) -> (Self, ShipperHandle) {
        let batch_size = config.batch_size.max(1);
        let buffer = match config.max_buffered_records {
            Some(capacity) => {
                ShippingBuffer::bounded(capacity.max(batch_size), config.overflow_policy)
            }
            None => ShippingBuffer::unbounded(),
        };
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                buffer,
                in_progress: false,
                state: FlushState::Idle,
                running: true,
            }),
            trigger: Notify::new(),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let service = Self {
            shared: Arc::clone(&shared),
            sender,
            batch_size,
            retry: config.retry,
            shutdown_timeout: config.shutdown_timeout,
            rx,
        };
        let handle = ShipperHandle {
            shared,
            batch_size,
            tx,
        };
        (service, handle)
    }

    pub async fn run(mut self) {
        debug!("LOGS | Flush coordinator started");
        loop {
            tokio::select! {
                () = self.shared.trigger.notified() => {
                    self.drain(0).await;
                }
                command = self.rx.recv() => match command {
                    Some(Command::Flush(reply)) => {
                        let pending = self.shared.lock().buffer.len();
                        self.drain(pending).await;
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown(reply)) => {
                        self.final_drain().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.final_drain().await;
                        break;
                    }
                },
            }
        }
        debug!("LOGS | Flush coordinator stopped");
    }

    /// Drains everything within `shutdown_timeout`, then discards whatever
    /// is left.
    async fn final_drain(&self) {
        self.shared.lock().running = false;
        if tokio::time::timeout(self.shutdown_timeout, self.drain(usize::MAX))
            .await
            .is_ok()
        {
            return;
        }

        let discarded = {
            let mut inner = self.shared.lock();
            let len = inner.buffer.len();
            let removed = inner.buffer.remove_prefix(len);
            inner.in_progress = false;
            inner.state = FlushState::Idle;
            removed.map(|()| len)
        };
        match discarded {
            Ok(count) => error!(
                "LOGS | Shutdown deadline reached, discarding {count} buffered records"
            ),
            Err(e) => error!("LOGS | Failed to discard buffered records: {e}"),
        }
    }

    /// Sends full batches until fewer than `batch_size` records remain.
    /// Up to `partial_budget` records are also sent as a short final batch.
    ///
    /// A threshold-only drain (`partial_budget == 0`) yields as soon as
    /// shutdown begins so the bounded final drain can take over.
    async fn drain(&self, mut partial_budget: usize) {
        loop {
            let batch = {
                let mut inner = self.shared.lock();
                let len = inner.buffer.len();
                let yield_to_shutdown = !inner.running && partial_budget == 0;
                let take = if yield_to_shutdown {
                    0
                } else if len >= self.batch_size {
                    self.batch_size
                } else {
                    len.min(partial_budget)
                };
                if take == 0 {
                    inner.in_progress = false;
                    inner.state = FlushState::Idle;
                    return;
                }
                inner.in_progress = true;
                let batch = inner.buffer.peek_batch(take);
                inner.buffer.pin_prefix(batch.len());
                batch
            };
            partial_budget = partial_budget.saturating_sub(batch.len());
            self.deliver(&batch).await;
        }
    }

    /// Sends `batch` with retries, then removes it from the buffer whether it
    /// was delivered or dropped.
    async fn deliver(&self, batch: &[LogRecord]) {
        let mut attempt = 0;
        loop {
            self.shared.set_state(FlushState::Flushing { attempt });
            match self.sender.send(batch).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("LOGS | Failed to send batch (attempt {}): {e}", attempt + 1);
                    if attempt >= self.retry.max_retries {
                        error!(
                            "LOGS | Max retries reached, dropping batch of {} records",
                            batch.len()
                        );
                        break;
                    }
                    attempt += 1;
                    self.shared.set_state(FlushState::Backoff { attempt });
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
            }
        }

        let removed = self.shared.lock().buffer.remove_prefix(batch.len());
        debug_assert!(removed.is_ok(), "in-flight prefix shrank: {removed:?}");
        if let Err(e) = removed {
            error!("LOGS | Failed to release delivered batch: {e}");
        }
    }
}
