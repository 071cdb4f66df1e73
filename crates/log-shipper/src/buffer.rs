// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! FIFO buffer of records awaiting remote delivery.
//!
//! Records are appended at the tail and leave the buffer only as a
//! contiguous prefix once the batch holding them has been delivered or
//! permanently dropped. The prefix currently being delivered is *pinned*:
//! overflow eviction skips it, so a batch under retry is never modified.
//!
//! # Overflow
//!
//! A bounded buffer applies an [`OverflowPolicy`] when full:
//!
//! - [`OverflowPolicy::DropOldest`] evicts the oldest record that is not
//!   pinned, then appends the new one. When every buffered record is pinned
//!   the incoming record is rejected instead.
//! - [`OverflowPolicy::DropNewest`] rejects the incoming record.
//!
//! Both outcomes increment the [`dropped`](ShippingBuffer::dropped) counter.

use std::collections::VecDeque;
use std::str::FromStr;

use crate::error::{BufferError, ConfigError};
use crate::record::LogRecord;

/// What to do with a record that arrives while a bounded buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    DropNewest,
}

impl FromStr for OverflowPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drop_oldest" => Ok(Self::DropOldest),
            "drop_newest" => Ok(Self::DropNewest),
            other => Err(ConfigError::Invalid(format!(
                "unknown overflow policy '{other}'. Must be one of: drop_oldest, drop_newest"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShippingBuffer {
    records: VecDeque<LogRecord>,
    /// `None` means unbounded.
    capacity: Option<usize>,
    policy: OverflowPolicy,
    /// Length of the prefix owned by the in-flight batch.
    in_flight: usize,
    dropped: u64,
}

impl ShippingBuffer {
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            records: VecDeque::new(),
            capacity: None,
            policy: OverflowPolicy::default(),
            in_flight: 0,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: Some(capacity),
            policy,
            in_flight: 0,
            dropped: 0,
        }
    }

    /// Appends `record` at the tail.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::Full`] when a bounded buffer cannot make room
    /// for the record under its overflow policy. The record is discarded.
    pub fn enqueue(&mut self, record: LogRecord) -> Result<(), BufferError> {
        if let Some(capacity) = self.capacity {
            if self.records.len() >= capacity {
                match self.policy {
                    OverflowPolicy::DropOldest if self.in_flight < self.records.len() => {
                        // Oldest record outside the pinned prefix.
                        self.records.remove(self.in_flight);
                        self.dropped += 1;
                    }
                    _ => {
                        self.dropped += 1;
                        return Err(BufferError::Full { capacity });
                    }
                }
            }
        }
        self.records.push_back(record);
        Ok(())
    }

    /// Returns copies of up to `n` oldest records without removing them.
    #[must_use]
    pub fn peek_batch(&self, n: usize) -> Vec<LogRecord> {
        self.records.iter().take(n).cloned().collect()
    }

    /// Marks the first `n` records as belonging to the in-flight batch.
    pub fn pin_prefix(&mut self, n: usize) {
        self.in_flight = n.min(self.records.len());
    }

    /// Removes the `n` oldest records. `remove_prefix(0)` is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidCount`] if `n` exceeds the buffer length;
    /// the buffer is left untouched.
    pub fn remove_prefix(&mut self, n: usize) -> Result<(), BufferError> {
        let len = self.records.len();
        if n > len {
            return Err(BufferError::InvalidCount { requested: n, len });
        }
        self.records.drain(..n);
        self.in_flight = self.in_flight.saturating_sub(n);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Records evicted or rejected because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for ShippingBuffer {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::Level;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, message)
    }

    fn messages(records: &[LogRecord]) -> Vec<&str> {
        records.iter().map(LogRecord::message).collect()
    }

    fn buffer_with(items: &[&str]) -> ShippingBuffer {
        let mut buffer = ShippingBuffer::unbounded();
        for item in items {
            buffer.enqueue(record(item)).unwrap();
        }
        buffer
    }

    #[test]
    fn test_enqueue_appends_in_order() {
        let buffer = buffer_with(&["a", "b", "c"]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_peek_batch_does_not_remove() {
        let buffer = buffer_with(&["a", "b", "c"]);
        assert_eq!(messages(&buffer.peek_batch(2)), vec!["a", "b"]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_remove_prefix() {
        let mut buffer = buffer_with(&["a", "b", "c"]);
        buffer.remove_prefix(2).unwrap();
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["c"]);
    }

    #[test]
    fn test_remove_prefix_zero_is_noop() {
        let mut buffer = buffer_with(&["a", "b"]);
        buffer.remove_prefix(0).unwrap();
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_prefix_invalid_count() {
        let mut buffer = buffer_with(&["a"]);
        assert_eq!(
            buffer.remove_prefix(2),
            Err(BufferError::InvalidCount {
                requested: 2,
                len: 1
            })
        );
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_unbounded_never_drops() {
        let mut buffer = ShippingBuffer::unbounded();
        for i in 0..1_000 {
            buffer.enqueue(record(&i.to_string())).unwrap();
        }
        assert_eq!(buffer.len(), 1_000);
        assert_eq!(buffer.dropped(), 0);
    }

    #[test]
    fn test_drop_oldest_evicts_front() {
        let mut buffer = ShippingBuffer::bounded(2, OverflowPolicy::DropOldest);
        buffer.enqueue(record("a")).unwrap();
        buffer.enqueue(record("b")).unwrap();
        buffer.enqueue(record("c")).unwrap();
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["b", "c"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_drop_oldest_skips_pinned_prefix() {
        let mut buffer = ShippingBuffer::bounded(3, OverflowPolicy::DropOldest);
        for item in ["a", "b", "c"] {
            buffer.enqueue(record(item)).unwrap();
        }
        buffer.pin_prefix(2);
        buffer.enqueue(record("d")).unwrap();
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["a", "b", "d"]);
        assert_eq!(buffer.dropped(), 1);

        // Removing the delivered prefix releases the pin.
        buffer.remove_prefix(2).unwrap();
        assert_eq!(buffer.in_flight(), 0);
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["d"]);
    }

    #[test]
    fn test_drop_oldest_rejects_when_everything_pinned() {
        let mut buffer = ShippingBuffer::bounded(2, OverflowPolicy::DropOldest);
        buffer.enqueue(record("a")).unwrap();
        buffer.enqueue(record("b")).unwrap();
        buffer.pin_prefix(2);
        assert_eq!(
            buffer.enqueue(record("c")),
            Err(BufferError::Full { capacity: 2 })
        );
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["a", "b"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_drop_newest_rejects_incoming() {
        let mut buffer = ShippingBuffer::bounded(1, OverflowPolicy::DropNewest);
        buffer.enqueue(record("a")).unwrap();
        assert!(buffer.enqueue(record("b")).is_err());
        assert_eq!(messages(&buffer.peek_batch(10)), vec!["a"]);
        assert_eq!(buffer.dropped(), 1);
    }

    #[test]
    fn test_overflow_policy_from_str() {
        assert_eq!(
            "drop_oldest".parse::<OverflowPolicy>(),
            Ok(OverflowPolicy::DropOldest)
        );
        assert_eq!(
            "Drop-Newest".parse::<OverflowPolicy>(),
            Ok(OverflowPolicy::DropNewest)
        );
        assert!("block".parse::<OverflowPolicy>().is_err());
    }
}
