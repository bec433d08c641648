//! Coalescing Cache Module
//!
//! Read-through cache over a [`CacheStore`] that merges concurrent fetches
//! of the same key and refreshes stale entries in the background.
//!
//! Lookup outcomes:
//! - store error: returned as is, nothing is fetched
//! - miss: one deduplicated fetch, written to the store on success
//! - fresh hit: payload returned, no further work
//! - stale hit: payload returned immediately, one background refresh spawned
//!
//! Failed fetches are never written, so the next call retries from scratch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::inflight::{Admission, FetchResult, InflightRegistry};
use crate::cache::{CachePolicy, CacheStore};
use crate::error::{CacheError, FetchError};

/// Suffix giving background refreshes their own dedup bucket.
pub const REFRESH_SUFFIX: &str = ":refresh";

// == Lookup ==
/// Outcome of one cached lookup.
#[derive(Debug)]
pub struct Lookup {
    /// Payload handed to the caller
    pub payload: Bytes,
    /// Background refresh started by this lookup, if the hit was stale
    pub refresh: Option<RefreshHandle>,
}

// == Refresh Handle ==
/// Completion signal of a background refresh.
///
/// Dropping the handle does not cancel the refresh.
#[derive(Debug)]
pub struct RefreshHandle {
    task: JoinHandle<FetchResult>,
}

impl RefreshHandle {
    /// Waits for the refresh to finish and returns its result.
    pub async fn wait(self) -> FetchResult {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(FetchError::Transport(format!(
                "refresh task failed: {join_err}"
            ))),
        }
    }
}

// == Coalescing Cache ==
/// Singleflight + stale-while-revalidate engine.
#[derive(Clone)]
pub struct CoalescingCache {
    store: Arc<dyn CacheStore>,
    inflight: Arc<InflightRegistry>,
    refresh_timeout: Duration,
}

impl CoalescingCache {
    /// Creates an engine over `store`; background refreshes get `refresh_timeout` each.
    pub fn new(store: Arc<dyn CacheStore>, refresh_timeout: Duration) -> Self {
        Self {
            store,
            inflight: InflightRegistry::new(),
            refresh_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn inflight(&self) -> &Arc<InflightRegistry> {
        &self.inflight
    }

    // == Get ==
    /// Returns the payload for `key`, fetching it with `fetch` when absent.
    pub async fn get<F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        fetch: F,
    ) -> Result<Bytes, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        self.lookup(key, policy, fetch)
            .await
            .map(|lookup| lookup.payload)
    }

    // == Lookup ==
    /// Like [`get`](Self::get) but exposes the background refresh it may start.
    pub async fn lookup<F, Fut>(
        &self,
        key: &str,
        policy: CachePolicy,
        fetch: F,
    ) -> Result<Lookup, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        if let Some(entry) = self.store.get(key).await? {
            if !entry.is_stale(policy.stale_after) {
                return Ok(Lookup {
                    payload: entry.payload,
                    refresh: None,
                });
            }

            debug!(key, age_ms = entry.age().as_millis() as u64, "serving stale entry");
            let refresh = self.spawn_refresh(key, policy.ttl, fetch);
            return Ok(Lookup {
                payload: entry.payload,
                refresh: Some(refresh),
            });
        }

        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let ttl = policy.ttl;

        let (pending, admission) = self.inflight.join(key, move || async move {
            let payload = fetch().await?;
            write_back(store.as_ref(), &owned_key, payload.clone(), ttl).await;
            Ok(payload)
        });

        if admission == Admission::Joined {
            debug!(key, "joined in-flight fetch");
        }

        Ok(Lookup {
            payload: pending.await?,
            refresh: None,
        })
    }

    // == Spawn Refresh ==
    /// Refreshes `key` in a detached task with its own timeout budget.
    ///
    /// Concurrent stale reads of one key share a single refresh.
    fn spawn_refresh<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> RefreshHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let owned_key = key.to_string();
        let budget = self.refresh_timeout;

        let (pending, admission) =
            self.inflight
                .join(&format!("{key}{REFRESH_SUFFIX}"), move || async move {
                    let payload = tokio::time::timeout(budget, fetch())
                        .await
                        .map_err(|_| FetchError::Timeout)??;
                    write_back(store.as_ref(), &owned_key, payload.clone(), ttl).await;
                    Ok(payload)
                });

        let log_key = key.to_string();
        let task = tokio::spawn(async move {
            let result = pending.await;
            if admission == Admission::Leader {
                match &result {
                    Ok(_) => debug!(key = %log_key, "background refresh completed"),
                    Err(err) => warn!(key = %log_key, error = %err, "background refresh failed"),
                }
            }
            result
        });

        RefreshHandle { task }
    }
}

/// Writes a fetched payload; failures only cost future hit rate.
async fn write_back(store: &dyn CacheStore, key: &str, payload: Bytes, ttl: Duration) {
    if let Err(err) = store.set(key, payload, ttl).await {
        warn!(key, store = store.name(), error = %err, "cache store failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, MemoryStore, NoopStore};
    use crate::error::StoreError;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::future::{join_all, FutureExt};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const POLICY: CachePolicy = CachePolicy {
        ttl: Duration::from_secs(300),
        stale_after: Duration::from_secs(60),
    };

    fn engine(store: Arc<dyn CacheStore>) -> CoalescingCache {
        CoalescingCache::new(store, Duration::from_secs(5))
    }

    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        payload: &'static str,
    ) -> impl FnOnce() -> futures::future::BoxFuture<'static, FetchResult> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(25)).await;
                Ok(Bytes::from_static(payload.as_bytes()))
            }
            .boxed()
        }
    }

    /// Store whose reads always fail.
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
            Err(StoreError::Timeout)
        }

        async fn set(&self, _key: &str, _payload: Bytes, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Timeout)
        }
    }

    /// Store that reads fine but cannot be written to.
    struct ReadOnlyStore;

    #[async_trait]
    impl CacheStore for ReadOnlyStore {
        fn name(&self) -> &'static str {
            "read-only"
        }

        async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, StoreError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _payload: Bytes, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Backend("read only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let store = Arc::new(MemoryStore::new(100));
        let cache = engine(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let lookups = (0..8).map(|_| cache.get("roblox:user:1", POLICY, counting_fetch(&calls, "v1")));
        let results = join_all(lookups).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), Bytes::from_static(b"v1"));
        }
        assert!(cache.inflight().is_empty());
        assert!(store.get("roblox:user:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_fetch() {
        let store = Arc::new(MemoryStore::new(100));
        store.set("k", Bytes::from_static(b"cached"), POLICY.ttl).await.unwrap();
        let cache = engine(store);
        let calls = Arc::new(AtomicUsize::new(0));

        let lookup = cache.lookup("k", POLICY, counting_fetch(&calls, "new")).await.unwrap();

        assert_eq!(lookup.payload, Bytes::from_static(b"cached"));
        assert!(lookup.refresh.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_hit_serves_old_and_refreshes() {
        let store = Arc::new(MemoryStore::new(100));
        let written = Utc::now() - chrono::Duration::seconds(61);
        store
            .insert_entry("k", CacheEntry::stored_at("old", written), POLICY.ttl)
            .await;
        let cache = engine(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let lookup = cache.lookup("k", POLICY, counting_fetch(&calls, "new")).await.unwrap();
        assert_eq!(lookup.payload, Bytes::from_static(b"old"));

        let refreshed = lookup.refresh.expect("stale hit starts a refresh").wait().await;
        assert_eq!(refreshed.unwrap(), Bytes::from_static(b"new"));

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"new"));
        assert!(entry.stored_at > written);

        let again = cache.get("k", POLICY, counting_fetch(&calls, "newer")).await.unwrap();
        assert_eq!(again, Bytes::from_static(b"new"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_stale_reads_share_refresh() {
        let store = Arc::new(MemoryStore::new(100));
        let written = Utc::now() - chrono::Duration::seconds(120);
        store
            .insert_entry("k", CacheEntry::stored_at("old", written), POLICY.ttl)
            .await;
        let cache = engine(store);
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.lookup("k", POLICY, counting_fetch(&calls, "new")).await.unwrap();
        let second = cache.lookup("k", POLICY, counting_fetch(&calls, "new")).await.unwrap();

        assert_eq!(first.payload, Bytes::from_static(b"old"));
        assert_eq!(second.payload, Bytes::from_static(b"old"));

        first.refresh.unwrap().wait().await.unwrap();
        second.refresh.unwrap().wait().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let store = Arc::new(MemoryStore::new(100));
        let written = Utc::now() - chrono::Duration::seconds(120);
        store
            .insert_entry("k", CacheEntry::stored_at("old", written), POLICY.ttl)
            .await;
        let cache = engine(store.clone());

        let lookup = cache
            .lookup("k", POLICY, || async { Err(FetchError::Status("503".to_string())) })
            .await
            .unwrap();
        assert!(lookup.refresh.unwrap().wait().await.is_err());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"old"));
        assert_eq!(entry.stored_at, written);
    }

    #[tokio::test]
    async fn test_refresh_has_own_timeout() {
        let store = Arc::new(MemoryStore::new(100));
        let written = Utc::now() - chrono::Duration::seconds(120);
        store
            .insert_entry("k", CacheEntry::stored_at("old", written), POLICY.ttl)
            .await;
        let cache = CoalescingCache::new(store, Duration::from_millis(20));

        let lookup = cache
            .lookup("k", POLICY, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Bytes::from_static(b"late"))
            })
            .await
            .unwrap();

        let result = lookup.refresh.unwrap().wait().await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let store = Arc::new(MemoryStore::new(100));
        let cache = engine(store.clone());
        let attempts = Arc::new(AtomicUsize::new(0));

        let fetch = |attempts: Arc<AtomicUsize>| {
            move || async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::Status("500 Internal Server Error".to_string()))
                } else {
                    Ok(Bytes::from_static(b"ok"))
                }
            }
        };

        let first = cache.get("k", POLICY, fetch(attempts.clone())).await;
        assert!(matches!(first, Err(CacheError::Fetch(_))));
        assert!(store.get("k").await.unwrap().is_none());

        let second = cache.get("k", POLICY, fetch(attempts.clone())).await;
        assert_eq!(second.unwrap(), Bytes::from_static(b"ok"));
        assert!(store.get("k").await.unwrap().is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_read_error_skips_fetch() {
        let cache = engine(Arc::new(BrokenStore));
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache.get("k", POLICY, counting_fetch(&calls, "v")).await;

        assert!(matches!(result, Err(CacheError::Store(StoreError::Timeout))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_write_error_is_swallowed() {
        let cache = engine(Arc::new(ReadOnlyStore));
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache.get("k", POLICY, counting_fetch(&calls, "v")).await;
        assert_eq!(result.unwrap(), Bytes::from_static(b"v"));
    }

    #[tokio::test]
    async fn test_noop_store_always_fetches() {
        let cache = engine(Arc::new(NoopStore));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get("k", POLICY, counting_fetch(&calls, "a")).await.unwrap();
        cache.get("k", POLICY, counting_fetch(&calls, "b")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_outlives_dropped_lookup() {
        let store = Arc::new(MemoryStore::new(100));
        let written = Utc::now() - chrono::Duration::seconds(120);
        store
            .insert_entry("k", CacheEntry::stored_at("old", written), POLICY.ttl)
            .await;
        let cache = engine(store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let lookup = cache.lookup("k", POLICY, counting_fetch(&calls, "new")).await.unwrap();
        assert_eq!(lookup.payload, Bytes::from_static(b"old"));
        assert!(lookup.refresh.is_some());
        drop(lookup);

        // counting_fetch takes 25ms.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.payload, Bytes::from_static(b"new"));
        assert!(entry.stored_at > written);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timed_out_lookups_release_inflight_slots() {
        let cache = engine(Arc::new(NoopStore));

        for i in 0..1000 {
            let key = format!("roblox:search:q{i}");
            let lookup = cache.get(&key, POLICY, || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Bytes::new())
            });
            assert!(tokio::time::timeout(Duration::from_millis(1), lookup)
                .await
                .is_err());
        }

        assert_eq!(cache.inflight().len(), 0);
    }
}
