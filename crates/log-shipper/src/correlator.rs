// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request-scoped correlation identifiers.
//!
//! Each inbound operation runs inside its own scope; every record emitted
//! from that scope (however deep in the call graph, across `.await` points)
//! carries the scope's identifier. The identifier lives in tokio task-local
//! storage, so concurrent operations on the same runtime never observe each
//! other's id, and it is cleared when the scope ends even if the operation
//! panics or returns early.
//!
//! ```rust,ignore
//! use log_shipper::correlator::{self, CorrelationId};
//!
//! correlator::scope(CorrelationId::from("req-42"), async {
//!     assert_eq!(correlator::current_id().unwrap().as_str(), "req-42");
//! })
//! .await;
//! assert!(correlator::current_id().is_none());
//! ```
//!
//! # Spawned tasks
//!
//! Task-local storage does not follow `tokio::spawn`. Work spawned from
//! inside an operation must carry the id explicitly:
//!
//! ```rust,ignore
//! use log_shipper::correlator::{self, CorrelationFutureExt};
//!
//! if let Some(id) = correlator::current_id() {
//!     tokio::spawn(persist_rates(rates).with_correlation(id));
//! }
//! ```

use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::futures::TaskLocalFuture;
use uuid::Uuid;

/// Upper bound on the length of an identifier accepted from a request header.
const MAX_HEADER_ID_LEN: usize = 128;

tokio::task_local! {
    static CORRELATION_ID: CorrelationId;
}

/// Opaque identifier shared by every record of one operation. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Generates a fresh random identifier.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Reuses an identifier supplied by the caller (e.g. an `x-request-id`
    /// header) when it is usable, otherwise generates a fresh one.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(id)
                if !id.is_empty()
                    && id.len() <= MAX_HEADER_ID_LEN
                    && id.chars().all(|c| c.is_ascii_graphic()) =>
            {
                Self(Arc::from(id))
            }
            _ => Self::new(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for CorrelationId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl Serialize for CorrelationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Returns the identifier of the operation currently executing on this task,
/// or `None` outside of any correlation scope. Tasks spawned from a scope
/// start without an id unless wrapped with [`CorrelationFutureExt::with_correlation`].
#[must_use]
pub fn current_id() -> Option<CorrelationId> {
    CORRELATION_ID.try_with(CorrelationId::clone).ok()
}

/// Runs `future` as a new operation with a freshly generated identifier.
pub fn begin<F>(future: F) -> TaskLocalFuture<CorrelationId, F>
where
    F: Future,
{
    scope(CorrelationId::new(), future)
}

/// Runs `future` with `id` as its correlation identifier.
///
/// Nested scopes shadow the outer identifier until they complete.
pub fn scope<F>(id: CorrelationId, future: F) -> TaskLocalFuture<CorrelationId, F>
where
    F: Future,
{
    CORRELATION_ID.scope(id, future)
}

/// Synchronous counterpart of [`scope`].
pub fn sync_scope<F, R>(id: CorrelationId, f: F) -> R
where
    F: FnOnce() -> R,
{
    CORRELATION_ID.sync_scope(id, f)
}

/// Attaches a correlation identifier to any future.
pub trait CorrelationFutureExt: Future + Sized {
    fn with_correlation(self, id: CorrelationId) -> TaskLocalFuture<CorrelationId, Self>;
}

impl<F> CorrelationFutureExt for F
where
    F: Future,
{
    fn with_correlation(self, id: CorrelationId) -> TaskLocalFuture<CorrelationId, Self> {
        scope(id, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_no_id_outside_scope() {
        assert!(current_id().is_none());
    }

    #[test]
    fn test_sync_scope_sets_and_clears() {
        let seen = sync_scope(CorrelationId::from("req-1"), current_id);
        assert_eq!(seen, Some(CorrelationId::from("req-1")));
        assert!(current_id().is_none());
    }

    #[tokio::test]
    async fn test_scope_survives_await_points() {
        scope(CorrelationId::from("req-42"), async {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(current_id().unwrap().as_str(), "req-42");
        })
        .await;
        assert!(current_id().is_none());
    }

    #[tokio::test]
    async fn test_nested_scope_shadows_outer() {
        scope(CorrelationId::from("outer"), async {
            scope(CorrelationId::from("inner"), async {
                assert_eq!(current_id().unwrap().as_str(), "inner");
            })
            .await;
            assert_eq!(current_id().unwrap().as_str(), "outer");
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let first = async {
            tokio::task::yield_now().await;
            current_id()
        }
        .with_correlation(CorrelationId::from("first"));
        let second = async {
            tokio::task::yield_now().await;
            current_id()
        }
        .with_correlation(CorrelationId::from("second"));

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().as_str(), "first");
        assert_eq!(second.unwrap().as_str(), "second");
    }

    #[tokio::test]
    async fn test_begin_generates_distinct_ids() {
        let a = begin(async { current_id() }).await.unwrap();
        let b = begin(async { current_id() }).await.unwrap();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[tokio::test]
    async fn test_spawned_task_needs_explicit_id() {
        scope(CorrelationId::from("parent"), async {
            let bare = tokio::spawn(async { current_id() }).await.unwrap();
            assert!(bare.is_none());

            let id = current_id().unwrap();
            let carried = tokio::spawn(async { current_id() }.with_correlation(id))
                .await
                .unwrap();
            assert_eq!(carried.unwrap().as_str(), "parent");
        })
        .await;
    }

    #[test]
    fn test_scope_cleared_after_panic() {
        let result = std::panic::catch_unwind(|| {
            sync_scope(CorrelationId::from("doomed"), || {
                assert_eq!(current_id().unwrap().as_str(), "doomed");
                panic!("operation failed");
            })
        });
        assert!(result.is_err());
        assert!(current_id().is_none());
    }

    #[test]
    fn test_from_header() {
        assert_eq!(
            CorrelationId::from_header(Some(" abc-123 ")).as_str(),
            "abc-123"
        );
        let generated = CorrelationId::from_header(Some(""));
        assert!(Uuid::parse_str(generated.as_str()).is_ok());
        let generated = CorrelationId::from_header(Some("has space"));
        assert!(Uuid::parse_str(generated.as_str()).is_ok());
        let generated = CorrelationId::from_header(None);
        assert!(Uuid::parse_str(generated.as_str()).is_ok());
        let too_long = "x".repeat(MAX_HEADER_ID_LEN + 1);
        assert_ne!(CorrelationId::from_header(Some(&too_long)).as_str(), too_long);
    }
}
