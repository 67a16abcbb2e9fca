//! Core traits for the aggregation engine
//!
//! These are the seams where collaborators outside the engine plug in:
//! the cache backing cached calls and the clock behind measurements.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::error::AggregateResult;

/// JSON-shaped payload produced by every call
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Deferred invocation of one call's capability
pub type CallFuture = BoxFuture<'static, AggregateResult<JsonObject>>;

/// Key/value cache with get-or-create semantics.
///
/// Implementations must run at most one `factory` per key at a time, so that
/// concurrent executions sharing a key coalesce into a single invocation.
/// Failed factories must not be cached.
#[async_trait]
pub trait AggregateCache: Send + Sync {
    /// Return the live entry for `key`, or await `factory` and store its
    /// payload for `ttl` (the cache's default when `None`).
    async fn get_or_create(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: CallFuture,
        cancel: &CancellationToken,
    ) -> AggregateResult<JsonObject>;
}

/// Monotonic clock used for measurements
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}
