//! Tagged get-or-compute cache.
//!
//! Entries, the tag index and per-tag epochs share one coarse lock, so a tag
//! invalidation can never interleave with a store of an entry carrying that
//! tag. Computation is serialized per key through flight locks held outside
//! the coarse lock, letting distinct keys compute concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;
use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::index::TagIndex;

const SOURCE: &str = "cache::store";

/// Monotonic per-tag invalidation counter.
pub type Epoch = u64;

/// A stored payload and the tags it was stored under. Immutable once built.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    payload: Bytes,
    tags: Box<[String]>,
}

impl CacheEntry {
    fn new(payload: Bytes, tags: &[&str]) -> Self {
        let mut owned: Vec<String> = tags.iter().map(|tag| (*tag).to_string()).collect();
        owned.sort_unstable();
        owned.dedup();
        Self {
            payload,
            tags: owned.into_boxed_slice(),
        }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

struct CacheState {
    entries: LruCache<String, CacheEntry>,
    index: TagIndex,
    epochs: HashMap<String, Epoch>,
}

impl CacheState {
    fn epoch(&self, tag: &str) -> Epoch {
        self.epochs.get(tag).copied().unwrap_or_default()
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.index.unregister(key, entry.tags());
                true
            }
            None => false,
        }
    }
}

/// Get-or-compute cache with tag-based bulk invalidation.
///
/// Construct one per process and share it behind an `Arc`.
pub struct TaggedCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl TaggedCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity_non_zero();
        Self {
            config,
            state: RwLock::new(CacheState {
                entries: LruCache::new(capacity),
                index: TagIndex::new(),
                epochs: HashMap::new(),
            }),
            flights: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the payload cached under `key`, or compute, store and return it.
    ///
    /// At most one caller computes a given key at a time. Callers that find a
    /// computation in flight wait for it and reuse its stored result; if it
    /// failed (or was invalidated mid-flight) they compute in turn with their
    /// own closure. A failed compute stores nothing and its error is returned
    /// only to the caller that ran it.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        tags: &[&str],
        compute: F,
    ) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if !self.config.enabled {
            return compute().await;
        }

        if let Some(payload) = self.lookup(key) {
            counter!("bookstore_cache_hit_total").increment(1);
            debug!(cache_key = key, outcome = "hit", "serving cached payload");
            return Ok(payload);
        }

        let _flight = self.acquire_flight(key).await;

        // Another caller may have filled the entry while we waited.
        if let Some(payload) = self.lookup(key) {
            counter!("bookstore_cache_hit_total").increment(1);
            debug!(cache_key = key, outcome = "hit_after_wait", "serving cached payload");
            return Ok(payload);
        }

        counter!("bookstore_cache_miss_total").increment(1);
        debug!(cache_key = key, outcome = "miss", "computing payload");

        let observed = self.observe_epochs(tags);
        let payload = compute().await?;
        self.store(key, payload.clone(), tags, &observed);
        Ok(payload)
    }

    /// Remove every entry carrying `tag`. Returns the number of entries removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut state = self.write("invalidate_tag");
        *state.epochs.entry(tag.to_string()).or_default() += 1;

        let keys = state.index.take(tag);
        let mut removed = 0;
        for key in &keys {
            if state.remove_entry(key) {
                removed += 1;
            }
        }
        drop(state);

        counter!("bookstore_cache_invalidation_total").increment(1);
        debug!(tag, removed, "invalidated cache tag");
        removed
    }

    /// True when an entry is stored under `key`. Does not touch LRU order.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read("contains_key").entries.contains(key)
    }

    /// Keys currently indexed under `tag`, sorted.
    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read("keys_for_tag")
            .index
            .keys_for(tag)
            .into_iter()
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.read("len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Epochs keep counting so in-flight stores are discarded.
    pub fn clear(&self) {
        let mut state = self.write("clear");
        state.entries.clear();
        state.index.clear();
        for epoch in state.epochs.values_mut() {
            *epoch += 1;
        }
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        self.write("lookup")
            .entries
            .get(key)
            .map(|entry| entry.payload().clone())
    }

    fn observe_epochs(&self, tags: &[&str]) -> Vec<(String, Epoch)> {
        let state = self.read("observe_epochs");
        tags.iter()
            .map(|tag| ((*tag).to_string(), state.epoch(tag)))
            .collect()
    }

    fn store(&self, key: &str, payload: Bytes, tags: &[&str], observed: &[(String, Epoch)]) {
        let mut state = self.write("store");

        if observed
            .iter()
            .any(|(tag, epoch)| state.epoch(tag) != *epoch)
        {
            drop(state);
            counter!("bookstore_cache_stale_skip_total").increment(1);
            debug!(
                cache_key = key,
                "tag invalidated during compute; result not cached"
            );
            return;
        }

        // Replacement is remove + insert, never an in-place update.
        state.remove_entry(key);

        let entry = CacheEntry::new(payload, tags);
        let indexed: Vec<String> = entry.tags().map(str::to_string).collect();
        if let Some((evicted_key, evicted)) = state.entries.push(key.to_string(), entry) {
            state.index.unregister(&evicted_key, evicted.tags());
            counter!("bookstore_cache_evict_total").increment(1);
            debug!(cache_key = %evicted_key, "evicted least recently used entry");
        }
        state.index.register(key, indexed.iter().map(String::as_str));
    }

    async fn acquire_flight(&self, key: &str) -> Flight<'_> {
        let lock = Arc::clone(
            self.flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let permit = Arc::clone(&lock).lock_owned().await;
        Flight {
            key: key.to_string(),
            flights: &self.flights,
            lock,
            permit: Some(permit),
        }
    }

    fn read(&self, op: &'static str) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|poisoned| {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.read",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        })
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|poisoned| {
            warn!(
                op,
                target_module = SOURCE,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        })
    }
}

/// Held while a caller owns the right to compute `key`.
///
/// Dropping it releases waiters and, when nobody else references the flight
/// lock, removes it from the map.
struct Flight<'a> {
    key: String,
    flights: &'a DashMap<String, Arc<Mutex<()>>>,
    lock: Arc<Mutex<()>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.permit.take();
        // One reference lives in the map and one in `self.lock`.
        self.flights.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn cache() -> TaggedCache {
        TaggedCache::new(CacheConfig::default())
    }

    async fn fill(cache: &TaggedCache, key: &str, tags: &[&str], body: &'static str) {
        cache
            .get_or_compute(key, tags, || async { Ok::<_, Infallible>(Bytes::from(body)) })
            .await
            .expect("infallible");
    }

    #[tokio::test]
    async fn second_lookup_does_not_recompute() {
        let cache = cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("getAllBooks-1-3", &["booksCache"], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Bytes::from_static(b"[1,2,3]"))
                })
                .await
                .unwrap();
            assert_eq!(value, Bytes::from_static(b"[1,2,3]"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_purges_every_entry_sharing_the_tag() {
        let cache = cache();
        fill(&cache, "k1", &["T"], "one").await;
        fill(&cache, "k2", &["T", "U"], "two").await;
        fill(&cache, "k3", &["U"], "three").await;

        let removed = cache.invalidate_tag("T");

        assert_eq!(removed, 2);
        assert!(!cache.contains_key("k1"));
        assert!(!cache.contains_key("k2"));
        assert!(cache.contains_key("k3"));
        // k2 must also have left the U bucket.
        assert_eq!(cache.keys_for_tag("U"), vec!["k3".to_string()]);
        assert!(cache.keys_for_tag("T").is_empty());
    }

    #[tokio::test]
    async fn invalidating_unknown_tag_is_a_no_op() {
        let cache = cache();
        fill(&cache, "k1", &["T"], "one").await;

        assert_eq!(cache.invalidate_tag("missing"), 0);
        assert_eq!(cache.invalidate_tag("missing"), 0);
        assert!(cache.contains_key("k1"));
    }

    #[tokio::test]
    async fn failed_compute_stores_nothing() {
        let cache = cache();

        let result = cache
            .get_or_compute("k", &["T"], || async { Err::<Bytes, _>("database down") })
            .await;

        assert_eq!(result.unwrap_err(), "database down");
        assert!(!cache.contains_key("k"));
        assert!(cache.keys_for_tag("T").is_empty());

        fill(&cache, "k", &["T"], "recovered").await;
        assert!(cache.contains_key("k"));
    }

    #[tokio::test]
    async fn invalidation_during_compute_is_not_resurrected() {
        let cache = cache();

        let value = cache
            .get_or_compute("k", &["T"], || async {
                cache.invalidate_tag("T");
                Ok::<_, Infallible>(Bytes::from_static(b"stale"))
            })
            .await
            .unwrap();

        assert_eq!(value, Bytes::from_static(b"stale"));
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test]
    async fn lru_eviction_keeps_index_consistent() {
        let cache = TaggedCache::new(CacheConfig {
            capacity: 2,
            ..Default::default()
        });

        fill(&cache, "k1", &["T"], "one").await;
        fill(&cache, "k2", &["T"], "two").await;
        fill(&cache, "k3", &["U"], "three").await;

        assert!(!cache.contains_key("k1"));
        assert_eq!(cache.keys_for_tag("T"), vec!["k2".to_string()]);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let cache = TaggedCache::new(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_compute("k", &["T"], || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Bytes::new())
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn flight_entries_are_released() {
        let cache = cache();
        fill(&cache, "k", &["T"], "one").await;
        let _ = cache
            .get_or_compute("other", &["T"], || async { Err::<Bytes, _>(()) })
            .await;

        assert!(cache.flights.is_empty());
    }

    #[tokio::test]
    async fn duplicate_tags_are_indexed_once() {
        let cache = cache();
        fill(&cache, "k", &["T", "T"], "one").await;

        assert_eq!(cache.invalidate_tag("T"), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let cache = cache();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.state.write().expect("state lock should be acquired");
            panic!("poison state lock");
        }));

        assert_eq!(cache.invalidate_tag("T"), 0);
        assert!(cache.is_empty());
    }
}
