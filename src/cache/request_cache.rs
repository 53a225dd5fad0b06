//! Time-boxed response cache with in-flight request de-duplication.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::http::types::{ApiError, ApiResult};
use crate::observability::metrics;

/// Default freshness window for dashboard-style reads.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(5000);

type SharedFetch<V> = Shared<BoxFuture<'static, ApiResult<V>>>;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

struct PendingFetch<V> {
    id: u64,
    future: SharedFetch<V>,
}

struct CacheInner<V> {
    entries: DashMap<String, CacheEntry<V>>,
    pending: DashMap<String, PendingFetch<V>>,
    next_id: AtomicU64,
    default_ttl: Duration,
}

/// A cache keyed by request identity.
///
/// Concurrent callers for the same key share a single fetch; successful
/// results are kept for the TTL, failures are never stored. The fetch runs
/// on its own task, so a waiter giving up never stalls it.
#[derive(Clone)]
pub struct RequestCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Default for RequestCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl<V> RequestCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                pending: DashMap::new(),
                next_id: AtomicU64::new(0),
                default_ttl,
            }),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Return the cached value for `key`, join an in-flight fetch, or run `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> ApiResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        self.get_or_fetch_with_ttl(key, self.inner.default_ttl, fetch)
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch) with a per-call freshness window.
    pub async fn get_or_fetch_with_ttl<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> ApiResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        if let Some(value) = self.fresh(key, ttl) {
            metrics::record_cache_lookup("hit");
            return Ok(value);
        }

        // The pending-map entry lock makes check-and-register a single step.
        let shared = match self.inner.pending.entry(key.to_string()) {
            Entry::Occupied(pending) => {
                tracing::debug!(key, "Joining in-flight request");
                metrics::record_cache_lookup("joined");
                pending.get().future.clone()
            }
            Entry::Vacant(slot) => {
                // A fetch may have completed between the first check and the lock.
                if let Some(value) = self.fresh(key, ttl) {
                    metrics::record_cache_lookup("hit");
                    return Ok(value);
                }
                metrics::record_cache_lookup("miss");
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let future = Self::track(Arc::downgrade(&self.inner), key.to_string(), id, fetch());
                slot.insert(PendingFetch {
                    id,
                    future: future.clone(),
                });
                future
            }
        };

        shared.await
    }

    /// Run `fetch` on its own task so it finishes even when every waiter
    /// has gone away. Completion stores the result and retires the pending
    /// marker, unless the marker was cleared or replaced meanwhile.
    fn track<Fut>(inner: Weak<CacheInner<V>>, key: String, id: u64, fetch: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = ApiResult<V>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = fetch.await;
            if let Some(inner) = inner.upgrade() {
                if let Entry::Occupied(pending) = inner.pending.entry(key.clone()) {
                    if pending.get().id == id {
                        if let Ok(value) = &result {
                            inner.entries.insert(
                                key,
                                CacheEntry {
                                    value: value.clone(),
                                    stored_at: Instant::now(),
                                },
                            );
                        }
                        pending.remove();
                    }
                }
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Err(ApiError::Cancelled),
            }
        }
        .boxed()
        .shared()
    }

    fn fresh(&self, key: &str, ttl: Duration) -> Option<V> {
        self.inner
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| entry.value.clone())
    }

    /// Fresh cached value under the default TTL, without fetching.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.fresh(key, self.inner.default_ttl)
    }

    /// Store `value` as a fresh entry (optimistic writes).
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.inner.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Mutate a cached value in place. Returns false when nothing is cached.
    pub fn update<F>(&self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut V),
    {
        match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                f(&mut entry.value);
                true
            }
            None => false,
        }
    }

    /// Drop the entry and any in-flight marker for `key`.
    pub fn invalidate(&self, key: &str) {
        self.inner.entries.remove(key);
        self.inner.pending.remove(key);
    }

    /// Drop every entry and in-flight marker whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.inner.entries.retain(|k, _| !k.starts_with(prefix));
        self.inner.pending.retain(|k, _| !k.starts_with(prefix));
    }

    /// Empty the cache and forget all in-flight requests.
    ///
    /// Requests already running still resolve for their callers but no
    /// longer populate the cache.
    pub fn clear(&self) {
        self.inner.entries.clear();
        self.inner.pending.clear();
        tracing::debug!("Request cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicU32;

    fn counting_fetch(
        calls: &Arc<AtomicU32>,
        value: &'static str,
    ) -> impl FnOnce() -> BoxFuture<'static, ApiResult<String>> {
        let calls = calls.clone();
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(value.to_string())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache: RequestCache<String> = RequestCache::default();
        let calls = Arc::new(AtomicU32::new(0));

        let results = join_all((0..8).map(|_| cache.get_or_fetch("leads:list", counting_fetch(&calls, "v1")))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("v1")));
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_failure_not_cached() {
        let cache: RequestCache<String> = RequestCache::default();
        let calls = Arc::new(AtomicU32::new(0));

        let failing = |calls: &Arc<AtomicU32>| {
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<String, _>(ApiError::ServerError {
                    status: 500,
                    message: "down".into(),
                })
            }
        };

        let results = join_all((0..4).map(|_| cache.get_or_fetch("calls", failing(&calls)))).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(ApiError::ServerError { status: 500, .. }))));
        assert!(cache.is_empty());
        assert_eq!(cache.pending_len(), 0);

        let value = cache
            .get_or_fetch("calls", counting_fetch(&calls, "recovered"))
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_window() {
        let cache: RequestCache<String> = RequestCache::new(Duration::from_millis(5000));
        let calls = Arc::new(AtomicU32::new(0));

        cache.get_or_fetch("k", counting_fetch(&calls, "a")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(4899)).await;
        cache.get_or_fetch("k", counting_fetch(&calls, "b")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(2)).await;
        let value = cache.get_or_fetch("k", counting_fetch(&calls, "c")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(value, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_ttl_override() {
        let cache: RequestCache<String> = RequestCache::default();
        let calls = Arc::new(AtomicU32::new(0));

        cache.get_or_fetch("k", counting_fetch(&calls, "a")).await.unwrap();
        tokio::time::advance(Duration::from_millis(1000)).await;
        cache
            .get_or_fetch_with_ttl("k", Duration::from_millis(500), counting_fetch(&calls, "b"))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_drops_in_flight_result() {
        let cache: RequestCache<String> = RequestCache::default();
        let calls = Arc::new(AtomicU32::new(0));

        let background = {
            let cache = cache.clone();
            let fetch = counting_fetch(&calls, "stale");
            tokio::spawn(async move { cache.get_or_fetch("dash", fetch).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(cache.pending_len(), 1);

        cache.clear();
        assert_eq!(background.await.unwrap().unwrap(), "stale");
        assert!(cache.peek("dash").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_helpers() {
        let cache: RequestCache<String> = RequestCache::default();
        cache.insert("leads:detail:1", "Ada".to_string());
        cache.insert("leads:list:page=1", "[Ada]".to_string());
        cache.insert("calls:list", "[]".to_string());

        assert!(cache.update("leads:detail:1", |v| v.push_str(" Lovelace")));
        assert_eq!(cache.peek("leads:detail:1").as_deref(), Some("Ada Lovelace"));
        assert!(!cache.update("missing", |_| {}));

        cache.invalidate_prefix("leads:");
        assert!(cache.peek("leads:detail:1").is_none());
        assert!(cache.peek("leads:list:page=1").is_none());
        assert_eq!(cache.peek("calls:list").as_deref(), Some("[]"));

        cache.invalidate("calls:list");
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_completes_after_every_waiter_leaves() {
        let cache: RequestCache<String> = RequestCache::default();
        let calls = Arc::new(AtomicU32::new(0));

        let waiter = {
            let cache = cache.clone();
            let fetch = counting_fetch(&calls, "late");
            tokio::spawn(async move { cache.get_or_fetch("dash", fetch).await })
        };
        tokio::task::yield_now().await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.pending_len(), 0);
        assert_eq!(cache.peek("dash").as_deref(), Some("late"));

        let value = cache.get_or_fetch("dash", counting_fetch(&calls, "new")).await.unwrap();
        assert_eq!(value, "late");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
