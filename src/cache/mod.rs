//! In-memory get-or-create cache for aggregate calls
//!
//! Each key owns a slot that is filled at most once. Callers arriving while a
//! slot is being filled wait on it instead of starting their own build, which
//! is what coalesces identical concurrent requests into one upstream call.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use log::trace;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::{
    config::CacheConfig,
    core::{AggregateCache, AggregateError, AggregateResult, CallFuture, JsonObject},
    metrics,
};

struct CacheEntry {
    payload: JsonObject,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

type Slot = Arc<OnceCell<CacheEntry>>;

pub struct MemoryCache {
    entries: DashMap<String, Slot>,
    default_ttl: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl MemoryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.default_ttl))
    }

    /// Number of slots, including ones still being built
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Slots that are still being built are kept.
    pub fn purge_expired(&self) {
        self.entries
            .retain(|_, slot| slot.get().map_or(true, |entry| !entry.is_expired()));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    // Slot for `key` that is either empty or holds a live entry.
    fn live_slot(&self, key: &str) -> Slot {
        loop {
            let slot = self.entries.entry(key.to_string()).or_default().value().clone();
            match slot.get() {
                Some(entry) if entry.is_expired() => {
                    trace!("Cache entry {key} expired");
                    self.entries
                        .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
                }
                _ => return slot,
            }
        }
    }
}

#[async_trait]
impl AggregateCache for MemoryCache {
    async fn get_or_create(
        &self,
        key: &str,
        ttl: Option<Duration>,
        factory: CallFuture,
        cancel: &CancellationToken,
    ) -> AggregateResult<JsonObject> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let slot = self.live_slot(key);

        let mut built = false;
        let init = slot.get_or_try_init(|| {
            built = true;
            async move {
                let payload = factory.await?;
                Ok::<_, AggregateError>(CacheEntry {
                    payload,
                    expires_at: Instant::now().checked_add(ttl),
                })
            }
        });

        let entry = tokio::select! {
            _ = cancel.cancelled() => return Err(AggregateError::Cancelled),
            entry = init => entry?,
        };

        metrics::record_cache_lookup(!built);
        trace!("Cache {} for {key}", if built { "miss" } else { "hit" });

        Ok(entry.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use serde_json::json;

    use super::*;

    fn counting_factory(counter: Arc<AtomicUsize>, delay: Duration) -> CallFuture {
        async move {
            tokio::time::sleep(delay).await;
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let mut payload = JsonObject::new();
            payload.insert("n".into(), json!(n));
            Ok(payload)
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_hit_skips_factory() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let first = cache
            .get_or_create("k", None, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();
        let second = cache
            .get_or_create("k", None, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(60)));
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_create(
                            "shared",
                            None,
                            counting_factory(counter, Duration::from_millis(50)),
                            &CancellationToken::new(),
                        )
                        .await
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            let payload = task.unwrap().unwrap();
            assert_eq!(payload.get("n"), Some(&json!(1)));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();

        let failed = cache
            .get_or_create(
                "k",
                None,
                async { Err(AggregateError::capability("down")) }.boxed(),
                &cancel,
            )
            .await;
        assert_eq!(failed, Err(AggregateError::capability("down")));

        let counter = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_create("k", None, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_rebuilt() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let ttl = Some(Duration::from_millis(10));

        cache
            .get_or_create("k", ttl, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let payload = cache
            .get_or_create("k", ttl, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();
        assert_eq!(payload.get("n"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_unbounded_ttl_never_expires() {
        let cache = MemoryCache::new(Duration::MAX);
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        for ttl in [None, Some(Duration::MAX)] {
            let key = format!("forever-{}", ttl.is_some());
            for _ in 0..2 {
                let payload = cache
                    .get_or_create(&key, ttl, counting_factory(counter.clone(), Duration::ZERO), &cancel)
                    .await
                    .unwrap();
                assert!(payload.contains_key("n"));
            }
        }

        cache.purge_expired();
        assert_eq!(cache.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new(Duration::from_millis(5));
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        cache
            .get_or_create("short", None, counting_factory(counter.clone(), Duration::ZERO), &cancel)
            .await
            .unwrap();
        cache
            .get_or_create(
                "long",
                Some(Duration::from_secs(60)),
                counting_factory(counter.clone(), Duration::ZERO),
                &cancel,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.purge_expired();
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let cache = MemoryCache::new(Duration::from_secs(60));
        let counter = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cache
            .get_or_create("k", None, counting_factory(counter, Duration::from_millis(50)), &cancel)
            .await;
        assert_eq!(result, Err(AggregateError::Cancelled));
    }
}
